//! Typed runtime callable registry for codegen.
//!
//! Every runtime function generated code may call is listed here once, with
//! its C symbol name, ABI signature and (for the JIT) its address.

/// Typed key for a runtime callable exposed to codegen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeKey {
    Retain,
    Release,
    ObjectNew,
    StringNew,
    StringConcat,
    StringEq,
    StringLen,
}

impl RuntimeKey {
    pub const ALL: &'static [RuntimeKey] = &[
        RuntimeKey::Retain,
        RuntimeKey::Release,
        RuntimeKey::ObjectNew,
        RuntimeKey::StringNew,
        RuntimeKey::StringConcat,
        RuntimeKey::StringEq,
        RuntimeKey::StringLen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuntimeKey::Retain => "cinder_retain",
            RuntimeKey::Release => "cinder_release",
            RuntimeKey::ObjectNew => "cinder_object_new",
            RuntimeKey::StringNew => "cinder_string_new",
            RuntimeKey::StringConcat => "cinder_string_concat",
            RuntimeKey::StringEq => "cinder_string_eq",
            RuntimeKey::StringLen => "cinder_string_len",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiTy {
    Ptr,
    I8,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy)]
pub struct SigSpec {
    pub params: &'static [AbiTy],
    pub ret: Option<AbiTy>,
}

pub fn signature_for(key: RuntimeKey) -> SigSpec {
    match key {
        RuntimeKey::Retain | RuntimeKey::Release => SigSpec {
            params: &[AbiTy::Ptr],
            ret: None,
        },
        // (size, vtable, drop_fn) -> object
        RuntimeKey::ObjectNew => SigSpec {
            params: &[AbiTy::I32, AbiTy::Ptr, AbiTy::Ptr],
            ret: Some(AbiTy::Ptr),
        },
        // (data, len) -> string
        RuntimeKey::StringNew => SigSpec {
            params: &[AbiTy::Ptr, AbiTy::Ptr],
            ret: Some(AbiTy::Ptr),
        },
        RuntimeKey::StringConcat => SigSpec {
            params: &[AbiTy::Ptr, AbiTy::Ptr],
            ret: Some(AbiTy::Ptr),
        },
        RuntimeKey::StringEq => SigSpec {
            params: &[AbiTy::Ptr, AbiTy::Ptr],
            ret: Some(AbiTy::I8),
        },
        RuntimeKey::StringLen => SigSpec {
            params: &[AbiTy::Ptr],
            ret: Some(AbiTy::I64),
        },
    }
}

/// Runtime symbols that can be linked into JIT modules.
#[derive(Clone, Copy)]
pub struct LinkableRuntimeSymbol {
    pub c_name: &'static str,
    pub ptr: *const u8,
}

const LINKABLE_RUNTIME_SYMBOLS: &[LinkableRuntimeSymbol] = &[
    LinkableRuntimeSymbol {
        c_name: "cinder_retain",
        ptr: cinder_runtime::value::cinder_retain as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_release",
        ptr: cinder_runtime::value::cinder_release as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_object_new",
        ptr: cinder_runtime::object::cinder_object_new as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_string_new",
        ptr: cinder_runtime::string::cinder_string_new as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_string_concat",
        ptr: cinder_runtime::string::cinder_string_concat as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_string_eq",
        ptr: cinder_runtime::string::cinder_string_eq as *const u8,
    },
    LinkableRuntimeSymbol {
        c_name: "cinder_string_len",
        ptr: cinder_runtime::string::cinder_string_len as *const u8,
    },
];

pub fn all_linkable_symbols() -> &'static [LinkableRuntimeSymbol] {
    LINKABLE_RUNTIME_SYMBOLS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn every_key_is_linkable() {
        let linkable: FxHashSet<&str> = all_linkable_symbols().iter().map(|s| s.c_name).collect();
        for key in RuntimeKey::ALL {
            assert!(linkable.contains(key.name()), "{key:?} has no JIT symbol");
        }
        assert_eq!(linkable.len(), RuntimeKey::ALL.len());
    }

    #[test]
    fn names_are_unique() {
        let names: FxHashSet<&str> = RuntimeKey::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), RuntimeKey::ALL.len());
    }
}
