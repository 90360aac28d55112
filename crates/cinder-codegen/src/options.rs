// options.rs

use cranelift::prelude::*;
use cranelift_codegen::isa::OwnedTargetIsa;

use crate::errors::{CodegenError, CodegenResult};

/// Options shared by the JIT and object backends.
#[derive(Clone, Debug)]
pub struct CodegenOptions {
    /// Release mode: disable verifier, enable speed optimizations
    pub release: bool,
    /// Keep the textual IR of every compiled function
    pub capture_ir: bool,
    /// Name recorded in emitted object files
    pub object_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self::debug()
    }
}

impl CodegenOptions {
    pub fn debug() -> Self {
        Self {
            release: false,
            capture_ir: false,
            object_name: "cinder".to_string(),
        }
    }

    pub fn release() -> Self {
        Self {
            release: true,
            ..Self::debug()
        }
    }

    pub fn with_ir_capture(mut self) -> Self {
        self.capture_ir = true;
        self
    }
}

/// Build the host ISA. Object files are position independent; JIT code is not.
pub(crate) fn native_isa(options: &CodegenOptions, pic: bool) -> CodegenResult<OwnedTargetIsa> {
    let mut flag_builder = settings::builder();
    let flags: [(&str, &str); 4] = [
        ("use_colocated_libcalls", "false"),
        ("is_pic", if pic { "true" } else { "false" }),
        ("opt_level", if options.release { "speed" } else { "none" }),
        ("enable_verifier", if options.release { "false" } else { "true" }),
    ];
    for (name, value) in flags {
        flag_builder
            .set(name, value)
            .map_err(|e| CodegenError::internal_with_context("invalid cranelift flag", format!("{name}: {e}")))?;
    }

    let isa_builder = cranelift_native::builder()
        .map_err(|msg| CodegenError::internal_with_context("native ISA not available", msg))?;
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(CodegenError::cranelift)
}
