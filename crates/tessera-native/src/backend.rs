use std::fmt;

use cranelift_codegen::ir::{types, AbiParam, Function, InstBuilder, Signature, Type, UserFuncName};
use cranelift_codegen::isa::TargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, Linkage, Module};
use tessera_ir::{Graph, LirGenerator, NodeKind};

use crate::emitter::{translate_stamp, CraneliftEmitter};
use crate::NativeError;

/// A graph compiled to native code.
pub struct CompiledGraph {
    pub name: String,
    pub signature: Signature,
    func_ptr: *const u8,
    #[allow(dead_code)] // Needs to be kept alive for the function pointer to be valid
    jit_module: JITModule,
}

// Manual Debug implementation since JITModule doesn't implement Debug
impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("func_ptr", &self.func_ptr)
            .field("jit_module", &"[JITModule]")
            .finish()
    }
}

impl CompiledGraph {
    pub fn func_ptr(&self) -> *const u8 {
        self.func_ptr
    }

    /// Reinterprets the compiled code as a function of type `F`.
    ///
    /// # Safety
    /// `F` must be an `extern "C"` function pointer type whose parameters and
    /// results match [`CompiledGraph::signature`].
    pub unsafe fn as_fn<F: Copy>(&self) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const u8>());
        std::mem::transmute_copy(&self.func_ptr)
    }
}

fn host_isa() -> Result<std::sync::Arc<dyn TargetIsa>, NativeError> {
    let mut flag_builder = settings::builder();
    flag_builder.set("use_colocated_libcalls", "false")?;
    flag_builder.set("is_pic", "false")?;
    // Enable verifier passes in debug builds
    #[cfg(debug_assertions)]
    flag_builder.set("enable_verifier", "true")?;
    flag_builder.set("opt_level", "none")?;
    let flags = settings::Flags::new(flag_builder);

    let isa_builder = cranelift_native::builder()
        .map_err(|e| NativeError::IsaSetupError(format!("Host target lookup failed: {}", e)))?;
    isa_builder
        .finish(flags)
        .map_err(|e| NativeError::IsaSetupError(format!("ISA construction failed: {}", e)))
}

/// Encodings map 64-bit addresses, so object values must be 64 bits wide.
fn check_pointer_type(pointer_type: Type) -> Result<(), NativeError> {
    if pointer_type != types::I64 {
        return Err(NativeError::Unimplemented(format!(
            "compressed pointers on a host with {}-bit pointers",
            pointer_type.bits()
        )));
    }
    Ok(())
}

fn graph_signature(graph: &Graph, module: &JITModule) -> Result<Signature, NativeError> {
    let pointer_type = module.isa().pointer_type();
    let mut sig = module.make_signature();

    for (position, (index, id)) in graph.parameters().into_iter().enumerate() {
        if index as usize != position {
            return Err(NativeError::TypeError(format!(
                "parameter {} is missing from graph {}",
                position, graph.name
            )));
        }
        let ty = translate_stamp(graph.stamp(id)?, pointer_type)?
            .ok_or_else(|| NativeError::TypeError(format!("parameter {} has no value", index)))?;
        sig.params.push(AbiParam::new(ty));
    }

    for root in graph.roots() {
        if let NodeKind::Return { value } = graph.node(*root)?.kind {
            let ty = translate_stamp(graph.stamp(value)?, pointer_type)?
                .ok_or_else(|| NativeError::TypeError(format!("return of {} has no value", value)))?;
            sig.returns.push(AbiParam::new(ty));
        }
    }
    Ok(sig)
}

/// JIT-compiles `graph` into a host function taking the graph's parameters in
/// index order and returning the values of its return nodes in root order.
pub fn compile_graph(graph: &Graph) -> Result<CompiledGraph, NativeError> {
    let isa = host_isa()?;
    log::debug!("compiling graph {} for {}", graph.name, target_lexicon::HOST);
    let pointer_type = isa.pointer_type();
    check_pointer_type(pointer_type)?;

    let mut jit_module = JITModule::new(JITBuilder::with_isa(isa, default_libcall_names()));
    let sig = graph_signature(graph, &jit_module)?;
    let func_id = jit_module.declare_function(&graph.name, Linkage::Export, &sig)?;

    let mut ctx = jit_module.make_context();
    ctx.func = Function::with_name_signature(UserFuncName::user(0, func_id.as_u32()), sig.clone());
    let mut builder_ctx = FunctionBuilderContext::new();
    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);
        let params = builder.block_params(entry).to_vec();

        let returned = {
            let mut gen = LirGenerator::new(CraneliftEmitter::new(&mut builder, params, pointer_type));
            gen.generate(graph)?
        };
        builder.ins().return_(&returned);
        builder.finalize();
    }
    log::trace!("{}", ctx.func.display());

    jit_module.define_function(func_id, &mut ctx)?;
    jit_module.clear_context(&mut ctx);
    jit_module.finalize_definitions()?;
    let func_ptr = jit_module.get_finalized_function(func_id);

    Ok(CompiledGraph {
        name: graph.name.clone(),
        signature: sig,
        func_ptr,
        jit_module,
    })
}
