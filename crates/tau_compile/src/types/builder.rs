//! The hash-consing type builder.
//!
//! The builder is the only way to construct type descriptors. Every
//! `build_*` operation interns against structural equality, so two builds
//! of the same type yield the same [`TypeId`] for the whole translation
//! unit, and type equality is id equality. Primitives are allocated once at
//! construction.
//!
//! The builder also carries the algebra that needs to see through ids:
//! modifier stacking rules, one-layer removal, arithmetic promotion,
//! implicit/explicit convertibility, and mangling.

use std::collections::HashMap;

use tau_language::ast::{CallConv, Prim};
use tau_language::NodeId;

use super::desc::{TypeDesc, TypeId};

pub struct TypeBuilder {
    descs: Vec<TypeDesc>,
    intern: HashMap<TypeDesc, TypeId>,
}

impl TypeBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            descs: Vec::new(),
            intern: HashMap::new(),
        };

        // Primitive singletons exist from the start.
        for desc in [
            TypeDesc::I8,
            TypeDesc::I16,
            TypeDesc::I32,
            TypeDesc::I64,
            TypeDesc::Isize,
            TypeDesc::U8,
            TypeDesc::U16,
            TypeDesc::U32,
            TypeDesc::U64,
            TypeDesc::Usize,
            TypeDesc::F32,
            TypeDesc::F64,
            TypeDesc::C64,
            TypeDesc::C128,
            TypeDesc::Char,
            TypeDesc::Bool,
            TypeDesc::Unit,
            TypeDesc::Null,
            TypeDesc::Poison,
        ] {
            builder.intern(desc);
        }

        builder
    }

    fn intern(&mut self, desc: TypeDesc) -> TypeId {
        if let Some(&id) = self.intern.get(&desc) {
            return id;
        }
        let id = TypeId(self.descs.len() as u32);
        self.descs.push(desc.clone());
        self.intern.insert(desc, id);
        id
    }

    pub fn desc(&self, id: TypeId) -> &TypeDesc {
        &self.descs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Iterates descriptors in id order. Components of a composite always
    /// precede it, since they had to be built first.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDesc)> {
        self.descs
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeId(i as u32), d))
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn prim(&mut self, prim: Prim) -> TypeId {
        let desc = match prim {
            Prim::I8 => TypeDesc::I8,
            Prim::I16 => TypeDesc::I16,
            Prim::I32 => TypeDesc::I32,
            Prim::I64 => TypeDesc::I64,
            Prim::Isize => TypeDesc::Isize,
            Prim::U8 => TypeDesc::U8,
            Prim::U16 => TypeDesc::U16,
            Prim::U32 => TypeDesc::U32,
            Prim::U64 => TypeDesc::U64,
            Prim::Usize => TypeDesc::Usize,
            Prim::F32 => TypeDesc::F32,
            Prim::F64 => TypeDesc::F64,
            Prim::C64 => TypeDesc::C64,
            Prim::C128 => TypeDesc::C128,
            Prim::Char => TypeDesc::Char,
            Prim::Bool => TypeDesc::Bool,
            Prim::Unit => TypeDesc::Unit,
        };
        self.intern(desc)
    }

    pub fn i32(&mut self) -> TypeId {
        self.intern(TypeDesc::I32)
    }

    pub fn u8(&mut self) -> TypeId {
        self.intern(TypeDesc::U8)
    }

    pub fn usize(&mut self) -> TypeId {
        self.intern(TypeDesc::Usize)
    }

    pub fn f32(&mut self) -> TypeId {
        self.intern(TypeDesc::F32)
    }

    pub fn bool(&mut self) -> TypeId {
        self.intern(TypeDesc::Bool)
    }

    pub fn unit(&mut self) -> TypeId {
        self.intern(TypeDesc::Unit)
    }

    pub fn char(&mut self) -> TypeId {
        self.intern(TypeDesc::Char)
    }

    pub fn null(&mut self) -> TypeId {
        self.intern(TypeDesc::Null)
    }

    pub fn poison(&mut self) -> TypeId {
        self.intern(TypeDesc::Poison)
    }

    pub fn build_mut(&mut self, base: TypeId) -> TypeId {
        debug_assert!(self.can_add_mut(base));
        self.intern(TypeDesc::Mut(base))
    }

    pub fn build_ptr(&mut self, base: TypeId) -> TypeId {
        debug_assert!(self.can_add_ptr(base));
        self.intern(TypeDesc::Ptr(base))
    }

    /// Builds an array type. Zero lengths are rejected here so downstream
    /// consumers (mangling included) only ever see positive sizes.
    pub fn build_array(&mut self, len: u64, base: TypeId) -> TypeId {
        debug_assert!(len > 0, "array length must be positive");
        debug_assert!(self.can_add_array(base));
        self.intern(TypeDesc::Array { len, base })
    }

    pub fn build_ref(&mut self, base: TypeId) -> TypeId {
        debug_assert!(self.can_add_ref(base));
        self.intern(TypeDesc::Ref(base))
    }

    pub fn build_opt(&mut self, base: TypeId) -> TypeId {
        debug_assert!(self.can_add_opt(base));
        self.intern(TypeDesc::Opt(base))
    }

    pub fn build_vector(&mut self, lanes: u8, elem: TypeId) -> TypeId {
        debug_assert!(self.desc(elem).is_arithmetic());
        self.intern(TypeDesc::Vector { lanes, elem })
    }

    pub fn build_matrix(&mut self, rows: u8, cols: u8, elem: TypeId) -> TypeId {
        debug_assert!(self.desc(elem).is_arithmetic());
        self.intern(TypeDesc::Matrix { rows, cols, elem })
    }

    pub fn build_fun(
        &mut self,
        params: Vec<TypeId>,
        ret: TypeId,
        is_vararg: bool,
        callconv: CallConv,
    ) -> TypeId {
        self.intern(TypeDesc::Fun {
            params,
            ret,
            is_vararg,
            callconv,
        })
    }

    pub fn build_struct(&mut self, decl: NodeId, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeDesc::Struct { decl, fields })
    }

    pub fn build_union(&mut self, decl: NodeId, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeDesc::Union { decl, fields })
    }

    pub fn build_enum(&mut self, decl: NodeId) -> TypeId {
        self.intern(TypeDesc::Enum { decl })
    }

    /// An inference variable for the generic parameter declared at `decl`.
    pub fn build_var(&mut self, decl: NodeId) -> TypeId {
        self.intern(TypeDesc::Var(decl))
    }

    /// Re-interns an already-canonical descriptor. Used when merging
    /// environments; component ids must already belong to this builder.
    pub fn readopt(&mut self, desc: TypeDesc) -> TypeId {
        self.intern(desc)
    }

    // ------------------------------------------------------------------
    // Modifier stacking
    // ------------------------------------------------------------------

    pub fn can_add_mut(&self, base: TypeId) -> bool {
        !matches!(
            self.desc(base),
            TypeDesc::Mut(_) | TypeDesc::Ref(_) | TypeDesc::Fun { .. }
        )
    }

    pub fn can_add_ptr(&self, base: TypeId) -> bool {
        !matches!(self.desc(base), TypeDesc::Ref(_))
    }

    pub fn can_add_array(&self, base: TypeId) -> bool {
        !matches!(self.desc(base), TypeDesc::Ref(_) | TypeDesc::Fun { .. })
    }

    pub fn can_add_ref(&self, base: TypeId) -> bool {
        !matches!(self.desc(base), TypeDesc::Ref(_))
    }

    pub fn can_add_opt(&self, base: TypeId) -> bool {
        !matches!(
            self.desc(base),
            TypeDesc::Mut(_) | TypeDesc::Ref(_) | TypeDesc::Opt(_) | TypeDesc::Fun { .. }
        )
    }

    // ------------------------------------------------------------------
    // Modifier removal (exactly one layer)
    // ------------------------------------------------------------------

    pub fn remove_mut(&self, id: TypeId) -> TypeId {
        match self.desc(id) {
            TypeDesc::Mut(base) => *base,
            _ => id,
        }
    }

    pub fn remove_ptr(&self, id: TypeId) -> TypeId {
        match self.desc(id) {
            TypeDesc::Ptr(base) => *base,
            _ => id,
        }
    }

    pub fn remove_array(&self, id: TypeId) -> TypeId {
        match self.desc(id) {
            TypeDesc::Array { base, .. } => *base,
            _ => id,
        }
    }

    pub fn remove_ref(&self, id: TypeId) -> TypeId {
        match self.desc(id) {
            TypeDesc::Ref(base) => *base,
            _ => id,
        }
    }

    pub fn remove_opt(&self, id: TypeId) -> TypeId {
        match self.desc(id) {
            TypeDesc::Opt(base) => *base,
            _ => id,
        }
    }

    pub fn remove_ref_mut(&self, id: TypeId) -> TypeId {
        self.remove_mut(self.remove_ref(id))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_poison(&self, id: TypeId) -> bool {
        self.desc(id).is_poison()
    }

    /// A callable is a `ref` to a `ptr` to a `fun`, or a `ptr` to a `fun`,
    /// with any intervening `mut`. A plain `ref fun` (a named function
    /// use) also qualifies.
    pub fn is_callable(&self, id: TypeId) -> bool {
        self.underlying_callable(id).is_some()
    }

    /// Peels modifiers down to the function type of a callable.
    pub fn underlying_callable(&self, id: TypeId) -> Option<TypeId> {
        let id = self.remove_mut(id);
        let id = match self.desc(id) {
            TypeDesc::Ref(base) => self.remove_ptr(self.remove_mut(*base)),
            TypeDesc::Ptr(base) => *base,
            _ => id,
        };
        match self.desc(id) {
            TypeDesc::Fun { .. } => Some(id),
            _ => None,
        }
    }

    /// Strips the reference/mut layers that expressions carry.
    pub fn peel(&self, id: TypeId) -> TypeId {
        self.remove_mut(self.remove_ref(self.remove_mut(id)))
    }

    /// Arithmetic promotion of two arithmetic descriptors.
    ///
    /// Same type wins; float beats integer; `f64` beats `f32`; otherwise
    /// the wider integer wins. Signedness never affects the result (the
    /// caller surfaces the mismatch as a warning).
    pub fn arithmetic_promote(&self, lhs: TypeId, rhs: TypeId) -> TypeId {
        let l = self.desc(lhs);
        let r = self.desc(rhs);
        debug_assert!(l.is_arithmetic() && r.is_arithmetic());

        if lhs == rhs {
            return lhs;
        }

        let l_float = l.is_float() || l.is_complex();
        let r_float = r.is_float() || r.is_complex();

        if l_float && !r_float {
            return lhs;
        }
        if !l_float && r_float {
            return rhs;
        }

        if l.arithmetic_bits() < r.arithmetic_bits() {
            rhs
        } else {
            lhs
        }
    }

    // ------------------------------------------------------------------
    // Convertibility
    // ------------------------------------------------------------------

    /// Implicit conversion `from → to`.
    ///
    /// After peeling the reference/mut layers on both sides, conversion
    /// holds when the types are equal, when both are arithmetic and the
    /// target widens without changing signedness, when a `null` meets any
    /// optional, or when a value meets its own optional. Pointer-to-pointer
    /// conversions demand identical pointees modulo dropping a `mut`
    /// (`ptr mut T → ptr T`, never the reverse).
    pub fn is_implicitly_convertible(&self, from: TypeId, to: TypeId) -> bool {
        if self.is_poison(from) || self.is_poison(to) {
            return true;
        }

        let f = self.peel(from);
        let t = self.peel(to);

        if f == t {
            return true;
        }

        let f_desc = self.desc(f);
        let t_desc = self.desc(t);

        if f_desc.is_arithmetic() && t_desc.is_arithmetic() {
            return f_desc.is_signed() == t_desc.is_signed()
                && f_desc.arithmetic_bits() <= t_desc.arithmetic_bits();
        }

        if let TypeDesc::Opt(inner) = t_desc {
            if matches!(f_desc, TypeDesc::Null) {
                return true;
            }
            if f == *inner {
                return true;
            }
        }

        if let (TypeDesc::Ptr(a), TypeDesc::Ptr(b)) = (f_desc, t_desc) {
            if a == b {
                return true;
            }
            // Only dropping mutability is allowed: ptr mut T → ptr T.
            if let TypeDesc::Mut(inner) = self.desc(*a) {
                return inner == b;
            }
            return false;
        }

        false
    }

    /// Explicit conversion `from → to` (the `as` operator).
    ///
    /// Arithmetic-to-arithmetic and pointer-to-pointer always convert;
    /// everything else falls back to the implicit rule.
    pub fn is_explicitly_convertible(&self, from: TypeId, to: TypeId) -> bool {
        if self.is_poison(from) || self.is_poison(to) {
            return true;
        }

        let f = self.peel(from);
        let t = self.peel(to);
        let f_desc = self.desc(f);
        let t_desc = self.desc(t);

        if f_desc.is_arithmetic() && t_desc.is_arithmetic() {
            return true;
        }
        if matches!(f_desc, TypeDesc::Ptr(_)) && matches!(t_desc, TypeDesc::Ptr(_)) {
            return true;
        }

        self.is_implicitly_convertible(from, to)
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    /// Human-readable rendering in surface syntax, for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        match self.desc(id) {
            TypeDesc::Mut(base) => format!("mut {}", self.display(*base)),
            TypeDesc::Ptr(base) => format!("*{}", self.display(*base)),
            TypeDesc::Array { len, base } => format!("[{}]{}", len, self.display(*base)),
            TypeDesc::Ref(base) => format!("&{}", self.display(*base)),
            TypeDesc::Opt(base) => format!("?{}", self.display(*base)),
            TypeDesc::Vector { lanes, elem } => format!("vec{}{}", lanes, self.display(*elem)),
            TypeDesc::Matrix { rows, cols, elem } => {
                format!("mat{}x{}{}", rows, cols, self.display(*elem))
            }
            TypeDesc::I8 => "i8".into(),
            TypeDesc::I16 => "i16".into(),
            TypeDesc::I32 => "i32".into(),
            TypeDesc::I64 => "i64".into(),
            TypeDesc::Isize => "isize".into(),
            TypeDesc::U8 => "u8".into(),
            TypeDesc::U16 => "u16".into(),
            TypeDesc::U32 => "u32".into(),
            TypeDesc::U64 => "u64".into(),
            TypeDesc::Usize => "usize".into(),
            TypeDesc::F32 => "f32".into(),
            TypeDesc::F64 => "f64".into(),
            TypeDesc::C64 => "c64".into(),
            TypeDesc::C128 => "c128".into(),
            TypeDesc::Char => "char".into(),
            TypeDesc::Bool => "bool".into(),
            TypeDesc::Unit => "unit".into(),
            TypeDesc::Null => "null".into(),
            TypeDesc::Fun { params, ret, is_vararg, .. } => {
                let mut parts: Vec<String> = params.iter().map(|&p| self.display(p)).collect();
                if *is_vararg {
                    parts.push("...".into());
                }
                format!("fun({}) -> {}", parts.join(", "), self.display(*ret))
            }
            TypeDesc::Struct { .. } => "struct".into(),
            TypeDesc::Union { .. } => "union".into(),
            TypeDesc::Enum { .. } => "enum".into(),
            TypeDesc::Var(_) => "_".into(),
            TypeDesc::Poison => "{error}".into(),
        }
    }

    // ------------------------------------------------------------------
    // Mangling
    // ------------------------------------------------------------------

    /// Deterministic, injective textual encoding of a canonical type.
    pub fn mangle(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.mangle_into(id, &mut out);
        out
    }

    fn mangle_into(&self, id: TypeId, out: &mut String) {
        match self.desc(id) {
            TypeDesc::Mut(base) => {
                out.push('m');
                self.mangle_into(*base, out);
            }
            TypeDesc::Ptr(base) => {
                out.push('p');
                self.mangle_into(*base, out);
            }
            TypeDesc::Array { len, base } => {
                out.push('a');
                out.push_str(&len.to_string());
                self.mangle_into(*base, out);
            }
            TypeDesc::Ref(base) => {
                out.push('r');
                self.mangle_into(*base, out);
            }
            TypeDesc::Opt(base) => {
                out.push('o');
                self.mangle_into(*base, out);
            }
            TypeDesc::Vector { lanes, elem } => {
                out.push('V');
                out.push_str(&lanes.to_string());
                self.mangle_into(*elem, out);
            }
            TypeDesc::Matrix { rows, cols, elem } => {
                out.push('M');
                out.push_str(&rows.to_string());
                out.push('x');
                out.push_str(&cols.to_string());
                self.mangle_into(*elem, out);
            }
            TypeDesc::I8 => out.push('a'),
            TypeDesc::I16 => out.push('s'),
            TypeDesc::I32 => out.push('i'),
            TypeDesc::I64 => out.push('x'),
            TypeDesc::Isize => out.push('l'),
            TypeDesc::U8 => out.push('h'),
            TypeDesc::U16 => out.push('t'),
            TypeDesc::U32 => out.push('j'),
            TypeDesc::U64 => out.push('y'),
            TypeDesc::Usize => out.push('w'),
            TypeDesc::F32 => out.push('f'),
            TypeDesc::F64 => out.push('d'),
            TypeDesc::C64 => out.push_str("Cf"),
            TypeDesc::C128 => out.push_str("Cd"),
            TypeDesc::Char => out.push('c'),
            TypeDesc::Bool => out.push('b'),
            TypeDesc::Unit => out.push('v'),
            TypeDesc::Null => out.push('n'),
            TypeDesc::Fun {
                params,
                ret,
                is_vararg,
                callconv,
            } => {
                out.push('F');
                out.push(mangle_callconv(*callconv));
                self.mangle_into(*ret, out);
                for param in params {
                    self.mangle_into(*param, out);
                }
                if *is_vararg {
                    out.push('z');
                }
                out.push('E');
            }
            TypeDesc::Struct { decl, .. } => {
                out.push('S');
                out.push_str(&decl.index().to_string());
            }
            TypeDesc::Union { decl, .. } => {
                out.push('U');
                out.push_str(&decl.index().to_string());
            }
            TypeDesc::Enum { decl } => {
                out.push('N');
                out.push_str(&decl.index().to_string());
            }
            TypeDesc::Var(decl) => {
                out.push('Z');
                out.push_str(&decl.index().to_string());
            }
            TypeDesc::Poison => out.push('P'),
        }
    }
}

impl Default for TypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-letter convention tags. `Tau` and `cdecl` share a tag: they only
/// differ in return-address handling, which does not affect symbol
/// identity.
fn mangle_callconv(conv: CallConv) -> char {
    match conv {
        CallConv::Tau | CallConv::Cdecl => 'C',
        CallConv::Stdcall => 'S',
        CallConv::Win64 => 'W',
        CallConv::Sysv64 => 'Y',
        CallConv::Aapcs => 'A',
        CallConv::Fastcall => 'F',
        CallConv::Vectorcall => 'V',
        CallConv::Thiscall => 'T',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: usize) -> NodeId {
        NodeId::from_index(index)
    }

    #[test]
    fn build_is_hash_consed() {
        let mut b = TypeBuilder::new();
        let i32a = b.i32();
        let i32b = b.i32();
        assert_eq!(i32a, i32b);

        let p1 = b.build_ptr(i32a);
        let p2 = b.build_ptr(i32b);
        assert_eq!(p1, p2);

        let f1 = b.build_fun(vec![i32a], i32a, false, CallConv::Tau);
        let f2 = b.build_fun(vec![i32a], i32a, false, CallConv::Tau);
        assert_eq!(f1, f2);
    }

    #[test]
    fn distinct_structures_get_distinct_ids() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let u32t = b.prim(Prim::U32);
        assert_ne!(b.build_ptr(i32t), b.build_ptr(u32t));
        assert_ne!(
            b.build_array(3, i32t),
            b.build_array(4, i32t)
        );
    }

    #[test]
    fn declared_twins_stay_distinct() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let s1 = b.build_struct(node(1), vec![i32t]);
        let s2 = b.build_struct(node(2), vec![i32t]);
        assert_ne!(s1, s2);
        // Same declaration yields the same descriptor.
        assert_eq!(s1, b.build_struct(node(1), vec![i32t]));
    }

    #[test]
    fn remove_peels_exactly_one_layer() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let m = b.build_mut(i32t);
        let p = b.build_ptr(m);
        let pp = b.build_ptr(p);

        assert_eq!(b.remove_ptr(pp), p);
        assert_eq!(b.remove_ptr(p), m);
        assert_eq!(b.remove_mut(m), i32t);
        // No-op on the wrong modifier.
        assert_eq!(b.remove_ref(p), p);
    }

    #[test]
    fn add_then_remove_round_trips() {
        let mut b = TypeBuilder::new();
        let base = b.i32();
        let m = b.build_mut(base);
        let p = b.build_ptr(base);
        let r = b.build_ref(base);
        let o = b.build_opt(base);
        let arr = b.build_array(8, base);
        assert_eq!(b.remove_mut(m), base);
        assert_eq!(b.remove_ptr(p), base);
        assert_eq!(b.remove_ref(r), base);
        assert_eq!(b.remove_opt(o), base);
        assert_eq!(b.remove_array(arr), base);
    }

    #[test]
    fn modifier_stacking_rules() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let m = b.build_mut(i32t);
        let r = b.build_ref(i32t);
        let o = b.build_opt(i32t);
        let f = b.build_fun(vec![], i32t, false, CallConv::Tau);

        // mut
        assert!(!b.can_add_mut(m));
        assert!(!b.can_add_mut(r));
        assert!(!b.can_add_mut(f));
        assert!(b.can_add_mut(o));

        // nothing stacks onto a ref
        assert!(!b.can_add_ptr(r));
        assert!(!b.can_add_array(r));
        assert!(!b.can_add_ref(r));
        assert!(!b.can_add_opt(r));

        // fun
        assert!(b.can_add_ptr(f));
        assert!(b.can_add_ref(f));
        assert!(!b.can_add_array(f));
        assert!(!b.can_add_opt(f));

        // opt accepts everything but opt
        assert!(b.can_add_ptr(o));
        assert!(b.can_add_array(o));
        assert!(b.can_add_ref(o));
        assert!(!b.can_add_opt(o));
    }

    #[test]
    fn promotion_prefers_float_then_width() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let i64t = b.prim(Prim::I64);
        let u32t = b.prim(Prim::U32);
        let f32t = b.f32();
        let f64t = b.prim(Prim::F64);

        assert_eq!(b.arithmetic_promote(i32t, i32t), i32t);
        assert_eq!(b.arithmetic_promote(i32t, f32t), f32t);
        assert_eq!(b.arithmetic_promote(f64t, i64t), f64t);
        assert_eq!(b.arithmetic_promote(f32t, f64t), f64t);
        assert_eq!(b.arithmetic_promote(i32t, i64t), i64t);
        // Signedness never affects the result.
        assert_eq!(b.arithmetic_promote(u32t, i32t), u32t);
    }

    #[test]
    fn implicit_conversion_peels_ref_and_mut() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let m = b.build_mut(i32t);
        let rm = b.build_ref(m);
        assert!(b.is_implicitly_convertible(rm, i32t));
        assert!(b.is_implicitly_convertible(i32t, rm));
    }

    #[test]
    fn implicit_widening_needs_matching_signedness() {
        let mut b = TypeBuilder::new();
        let i16t = b.prim(Prim::I16);
        let i32t = b.i32();
        let u16t = b.prim(Prim::U16);
        let u32t = b.prim(Prim::U32);

        assert!(b.is_implicitly_convertible(i16t, i32t));
        assert!(b.is_implicitly_convertible(u16t, u32t));
        assert!(!b.is_implicitly_convertible(i32t, i16t));
        assert!(!b.is_implicitly_convertible(u16t, i32t));
        assert!(!b.is_implicitly_convertible(i16t, u32t));
    }

    #[test]
    fn null_and_value_convert_to_optional() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let opt = b.build_opt(i32t);
        let null = b.null();

        assert!(b.is_implicitly_convertible(null, opt));
        assert!(b.is_implicitly_convertible(i32t, opt));
        assert!(!b.is_implicitly_convertible(opt, i32t));
    }

    #[test]
    fn pointer_mut_covariance_is_one_way() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let m = b.build_mut(i32t);
        let ptr_mut = b.build_ptr(m);
        let ptr = b.build_ptr(i32t);

        assert!(b.is_implicitly_convertible(ptr_mut, ptr));
        assert!(!b.is_implicitly_convertible(ptr, ptr_mut));
    }

    #[test]
    fn pointer_to_unrelated_pointer_is_explicit_only() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let u8t = b.u8();
        let p_i32 = b.build_ptr(i32t);
        let p_u8 = b.build_ptr(u8t);

        assert!(!b.is_implicitly_convertible(p_i32, p_u8));
        assert!(b.is_explicitly_convertible(p_i32, p_u8));
    }

    #[test]
    fn explicit_arithmetic_conversion_is_total() {
        let mut b = TypeBuilder::new();
        let u64t = b.prim(Prim::U64);
        let i8t = b.prim(Prim::I8);
        assert!(b.is_explicitly_convertible(u64t, i8t));
        assert!(b.is_explicitly_convertible(i8t, u64t));
    }

    #[test]
    fn poison_converts_both_ways() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let poison = b.poison();
        assert!(b.is_implicitly_convertible(poison, i32t));
        assert!(b.is_implicitly_convertible(i32t, poison));
        assert!(b.is_explicitly_convertible(poison, i32t));
    }

    #[test]
    fn callable_through_ref_and_ptr() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let fun = b.build_fun(vec![], i32t, false, CallConv::Tau);

        let r = b.build_ref(fun);
        assert!(b.is_callable(r));

        let p = b.build_ptr(fun);
        assert!(b.is_callable(p));

        let mp = b.build_mut(p);
        let rmp = b.build_ref(mp);
        assert!(b.is_callable(rmp));
        assert_eq!(b.underlying_callable(rmp), Some(fun));

        assert!(!b.is_callable(i32t));
        let ri32 = b.build_ref(i32t);
        assert!(!b.is_callable(ri32));
    }

    #[test]
    fn mangling_is_injective_over_distinct_types() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let u8t = b.u8();

        let mut samples = vec![i32t, u8t];
        samples.push(b.build_ptr(i32t));
        samples.push(b.build_ptr(u8t));
        let m = b.build_mut(i32t);
        samples.push(m);
        samples.push(b.build_ptr(m));
        samples.push(b.build_array(4, i32t));
        samples.push(b.build_array(14, i32t));
        samples.push(b.build_ref(i32t));
        samples.push(b.build_opt(i32t));
        samples.push(b.build_vector(4, i32t));
        samples.push(b.build_matrix(3, 3, i32t));
        samples.push(b.build_fun(vec![i32t, u8t], i32t, false, CallConv::Tau));
        samples.push(b.build_fun(vec![i32t, u8t], i32t, true, CallConv::Cdecl));
        samples.push(b.build_fun(vec![i32t], i32t, false, CallConv::Stdcall));
        samples.push(b.build_struct(node(1), vec![i32t]));
        samples.push(b.build_struct(node(2), vec![i32t]));
        samples.push(b.build_union(node(3), vec![i32t]));
        samples.push(b.build_enum(node(4)));

        let mangled: Vec<String> = samples.iter().map(|&id| b.mangle(id)).collect();
        for (i, a) in mangled.iter().enumerate() {
            for (j, bm) in mangled.iter().enumerate() {
                if i != j {
                    assert_ne!(a, bm, "types {:?} and {:?} collide", samples[i], samples[j]);
                }
            }
        }
    }

    #[test]
    fn mangling_examples_are_stable() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let m = b.build_mut(i32t);
        let p = b.build_ptr(m);
        assert_eq!(b.mangle(p), "pmi");

        let arr = b.build_array(8, i32t);
        assert_eq!(b.mangle(arr), "a8i");

        let f = b.build_fun(vec![i32t, i32t], i32t, false, CallConv::Tau);
        assert_eq!(b.mangle(f), "FCiiiE");

        let va = b.build_fun(vec![i32t], i32t, true, CallConv::Cdecl);
        assert_eq!(b.mangle(va), "FCiizE");
    }

    #[test]
    fn identical_types_mangle_identically() {
        let mut b = TypeBuilder::new();
        let i32t = b.i32();
        let a1 = b.build_array(4, i32t);
        let a2 = b.build_array(4, i32t);
        assert_eq!(b.mangle(a1), b.mangle(a2));
    }
}
