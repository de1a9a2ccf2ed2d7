//! Registration of the accelerated operators in a host dispatch table.
//!
//! Every operator is an [`Op`] variant with a fixed host name, dispatch key
//! and typed launcher pointer, so the set of registrations is known at
//! compile time and no string lookup happens on the call path. Names are only
//! used at the boundary with the host [`OperatorLibrary`].

use std::collections::HashMap;
use std::fmt;

use crate::context::Gems;
use crate::error::{GemsError, Result};
use crate::kernels::elementwise::GeluApproximate;
use crate::ops::{matmul, normalization, pointwise, random, reduction, resize};
use crate::tensor::Tensor;

/// Host selector choosing which implementation handles a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    /// The accelerator device.
    Cuda,
    /// The accelerator device combined with automatic differentiation.
    AutogradCuda,
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchKey::Cuda => "CUDA",
            DispatchKey::AutogradCuda => "AutogradCUDA",
        })
    }
}

type F32 = Tensor<f32>;

/// `(gems, x) -> y`
pub type UnaryFn = fn(&Gems, &F32) -> Result<F32>;
/// `(gems, x) -> mask`
pub type PredicateFn = fn(&Gems, &F32) -> Result<Tensor<bool>>;
/// `(gems, x) -> y` over integers.
pub type IntUnaryFn = fn(&Gems, &Tensor<i32>) -> Result<Tensor<i32>>;
/// `(gems, x, approximate) -> y`
pub type GeluFn = fn(&Gems, &F32, GeluApproximate) -> Result<F32>;
/// `(gems, a, b) -> y`
pub type BinaryFn = fn(&Gems, &F32, &F32) -> Result<F32>;
/// `(gems, a, b, alpha) -> y`
pub type BinaryAlphaFn = fn(&Gems, &F32, &F32, f32) -> Result<F32>;
/// `(gems, x, scalar) -> y`
pub type ScalarFn = fn(&Gems, &F32, f32) -> Result<F32>;
/// `(gems, x, scalar, alpha) -> y`
pub type ScalarAlphaFn = fn(&Gems, &F32, f32, f32) -> Result<F32>;
/// `(gems, base, x) -> y`
pub type ScalarBaseFn = fn(&Gems, f32, &F32) -> Result<F32>;
/// `(gems, x, out)`
pub type OutFn = fn(&Gems, &F32, &mut F32) -> Result<()>;
/// `(gems, x, dim) -> y`
pub type DimFn = fn(&Gems, &F32, isize) -> Result<F32>;
/// `(gems, x, diagonal) -> y`
pub type TriuFn = fn(&Gems, &F32, i64) -> Result<F32>;
/// `(gems, x, output_size, scale_h, scale_w) -> y`
pub type ResizeFn = fn(&Gems, &F32, &[usize], Option<f64>, Option<f64>) -> Result<F32>;
/// `(gems, x, output_size, align_corners, scale_h, scale_w) -> y`
pub type ResizeAlignedFn = fn(&Gems, &F32, &[usize], bool, Option<f64>, Option<f64>) -> Result<F32>;
/// `(gems, x, normalized_shape, weight, bias, eps) -> (out, mean, rstd)`
pub type LayerNormFn = fn(&Gems, &F32, &[usize], Option<&F32>, Option<&F32>, f64) -> Result<(F32, F32, F32)>;
/// `(gems, bias, a, b, beta, alpha) -> y`
pub type AddmmFn = fn(&Gems, &F32, &F32, &F32, f32, f32) -> Result<F32>;
/// `(gems, x, p, train) -> (out, mask)`
pub type DropoutFn = fn(&Gems, &F32, f64, Option<bool>) -> Result<(F32, Tensor<bool>)>;

/// A launcher with the exact signature the host expects for its operator.
#[derive(Clone, Copy)]
#[allow(missing_docs)]
pub enum Kernel {
    Unary(UnaryFn),
    Predicate(PredicateFn),
    IntUnary(IntUnaryFn),
    Gelu(GeluFn),
    Binary(BinaryFn),
    BinaryAlpha(BinaryAlphaFn),
    Scalar(ScalarFn),
    ScalarAlpha(ScalarAlphaFn),
    ScalarBase(ScalarBaseFn),
    Out(OutFn),
    Dim(DimFn),
    Triu(TriuFn),
    Resize(ResizeFn),
    ResizeAligned(ResizeAlignedFn),
    LayerNorm(LayerNormFn),
    Addmm(AddmmFn),
    Dropout(DropoutFn),
}

impl Kernel {
    /// Name of the launcher signature.
    pub fn signature(&self) -> &'static str {
        match self {
            Kernel::Unary(_) => "unary",
            Kernel::Predicate(_) => "predicate",
            Kernel::IntUnary(_) => "int_unary",
            Kernel::Gelu(_) => "gelu",
            Kernel::Binary(_) => "binary",
            Kernel::BinaryAlpha(_) => "binary_alpha",
            Kernel::Scalar(_) => "scalar",
            Kernel::ScalarAlpha(_) => "scalar_alpha",
            Kernel::ScalarBase(_) => "scalar_base",
            Kernel::Out(_) => "out",
            Kernel::Dim(_) => "dim",
            Kernel::Triu(_) => "triu",
            Kernel::Resize(_) => "resize",
            Kernel::ResizeAligned(_) => "resize_aligned",
            Kernel::LayerNorm(_) => "layer_norm",
            Kernel::Addmm(_) => "addmm",
            Kernel::Dropout(_) => "dropout",
        }
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kernel::{}", self.signature())
    }
}

macro_rules! ops {
    ($($variant:ident => $name:literal, $key:ident, $kernel:expr;)*) => {
        /// Every operator this library registers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Op {
            $($variant,)*
        }

        impl Op {
            /// All operators in registration order.
            pub const ALL: &'static [Op] = &[$(Op::$variant,)*];

            /// Host operator name, including the overload.
            pub fn name(self) -> &'static str {
                match self {
                    $(Op::$variant => $name,)*
                }
            }

            /// Key the operator is registered under.
            pub fn dispatch_key(self) -> DispatchKey {
                match self {
                    $(Op::$variant => DispatchKey::$key,)*
                }
            }

            /// The launcher bound to this operator.
            pub fn kernel(self) -> Kernel {
                match self {
                    $(Op::$variant => $kernel,)*
                }
            }
        }
    };
}

ops! {
    Abs => "abs", Cuda, Kernel::Unary(pointwise::abs::<f32>);
    Add => "add.Tensor", Cuda, Kernel::BinaryAlpha(pointwise::add::<f32>);
    AddScalar => "add.Scalar", Cuda, Kernel::ScalarAlpha(pointwise::add_scalar::<f32>);
    Addmm => "addmm", Cuda, Kernel::Addmm(matmul::addmm::<f32>);
    Amax => "amax", Cuda, Kernel::Unary(reduction::amax::<f32>);
    Amin => "amin", Cuda, Kernel::Unary(reduction::amin::<f32>);
    BitwiseNot => "bitwise_not", Cuda, Kernel::IntUnary(pointwise::bitwise_not::<i32>);
    Bmm => "bmm", Cuda, Kernel::Binary(matmul::bmm::<f32>);
    Cos => "cos", Cuda, Kernel::Unary(pointwise::cos::<f32>);
    Cumsum => "cumsum", Cuda, Kernel::Dim(reduction::cumsum::<f32>);
    Div => "div.Tensor", Cuda, Kernel::Binary(pointwise::div::<f32>);
    NativeDropout => "native_dropout", AutogradCuda, Kernel::Dropout(random::native_dropout::<f32>);
    Exp => "exp", Cuda, Kernel::Unary(pointwise::exp::<f32>);
    ExpOut => "exp.out", Cuda, Kernel::Out(pointwise::exp_out::<f32>);
    Gelu => "gelu", Cuda, Kernel::Gelu(pointwise::gelu::<f32>);
    Isinf => "isinf", Cuda, Kernel::Predicate(pointwise::isinf::<f32>);
    Isnan => "isnan", Cuda, Kernel::Predicate(pointwise::isnan::<f32>);
    NativeLayerNorm => "native_layer_norm", AutogradCuda, Kernel::LayerNorm(normalization::layer_norm::<f32>);
    Mean => "mean", Cuda, Kernel::Unary(reduction::mean::<f32>);
    Mm => "mm", Cuda, Kernel::Binary(matmul::mm::<f32>);
    Mul => "mul.Tensor", Cuda, Kernel::Binary(pointwise::mul::<f32>);
    MulScalar => "mul.Scalar", Cuda, Kernel::Scalar(pointwise::mul_scalar::<f32>);
    Neg => "neg", Cuda, Kernel::Unary(pointwise::neg::<f32>);
    PowScalar => "pow.Scalar", Cuda, Kernel::ScalarBase(pointwise::pow_scalar::<f32>);
    PowTensorScalar => "pow.Tensor_Scalar", Cuda, Kernel::Scalar(pointwise::pow_tensor_scalar::<f32>);
    PowTensorTensor => "pow.Tensor_Tensor", Cuda, Kernel::Binary(pointwise::pow_tensor_tensor::<f32>);
    Reciprocal => "reciprocal", Cuda, Kernel::Unary(pointwise::reciprocal::<f32>);
    Relu => "relu", AutogradCuda, Kernel::Unary(pointwise::relu::<f32>);
    Rsqrt => "rsqrt", Cuda, Kernel::Unary(pointwise::rsqrt::<f32>);
    Sigmoid => "sigmoid", AutogradCuda, Kernel::Unary(pointwise::sigmoid::<f32>);
    Silu => "silu", AutogradCuda, Kernel::Unary(pointwise::silu::<f32>);
    Sin => "sin", Cuda, Kernel::Unary(pointwise::sin::<f32>);
    Softmax => "softmax.int", AutogradCuda, Kernel::Dim(normalization::softmax::<f32>);
    Sub => "sub.Tensor", Cuda, Kernel::BinaryAlpha(pointwise::sub::<f32>);
    Sum => "sum", Cuda, Kernel::Unary(reduction::sum::<f32>);
    Tanh => "tanh", AutogradCuda, Kernel::Unary(pointwise::tanh::<f32>);
    Triu => "triu", Cuda, Kernel::Triu(pointwise::triu::<f32>);
    UpsampleBilinear2d => "upsample_bilinear2d", Cuda, Kernel::ResizeAligned(resize::upsample_bilinear2d::<f32>);
    UpsampleNearest2d => "upsample_nearest2d", Cuda, Kernel::Resize(resize::upsample_nearest2d::<f32>);
    UpsampleNearestExact2d => "_upsample_nearest_exact2d", Cuda, Kernel::Resize(resize::upsample_nearest_exact2d::<f32>);
}

impl Op {
    /// Operator registered under a host name.
    pub fn from_name(name: &str) -> Option<Op> {
        Op::ALL.iter().copied().find(|op| op.name() == name)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The host framework's operator dispatch table.
pub trait OperatorLibrary {
    /// Bind `kernel` to `name` under `key`.
    fn register(&mut self, name: &'static str, key: DispatchKey, kernel: Kernel) -> Result<()>;

    /// Remove the binding of `name` under `key`, returning it.
    fn deregister(&mut self, name: &str, key: DispatchKey) -> Option<Kernel>;
}

/// In-memory dispatch table that rejects duplicate bindings.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<DispatchKey, HashMap<&'static str, Kernel>>,
}

impl DispatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel bound to `name` under `key`.
    pub fn lookup(&self, name: &str, key: DispatchKey) -> Option<Kernel> {
        self.entries.get(&key)?.get(name).copied()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OperatorLibrary for DispatchTable {
    fn register(&mut self, name: &'static str, key: DispatchKey, kernel: Kernel) -> Result<()> {
        let bound = self.entries.entry(key).or_default();
        if bound.contains_key(name) {
            return Err(GemsError::Registration(format!("{name} is already registered for {key}")));
        }
        bound.insert(name, kernel);
        Ok(())
    }

    fn deregister(&mut self, name: &str, key: DispatchKey) -> Option<Kernel> {
        self.entries.get_mut(&key)?.remove(name)
    }
}

/// Register every operator into `lib`.
///
/// Stops at the first rejected registration; entries registered before it
/// stay bound.
pub fn enable<L: OperatorLibrary + ?Sized>(lib: &mut L) -> Result<()> {
    for &op in Op::ALL {
        log::trace!("register {} for {}", op, op.dispatch_key());
        lib.register(op.name(), op.dispatch_key(), op.kernel())?;
    }
    Ok(())
}

/// Registers every operator for its lifetime and removes them on drop.
pub struct GemsScope<'a, L: OperatorLibrary> {
    lib: &'a mut L,
    registered: Vec<Op>,
}

impl<'a, L: OperatorLibrary> GemsScope<'a, L> {
    /// Register all operators into `lib`.
    ///
    /// On failure the operators registered so far are removed again.
    pub fn new(lib: &'a mut L) -> Result<Self> {
        let mut scope = Self {
            lib,
            registered: Vec::with_capacity(Op::ALL.len()),
        };
        for &op in Op::ALL {
            scope.lib.register(op.name(), op.dispatch_key(), op.kernel())?;
            scope.registered.push(op);
        }
        Ok(scope)
    }

    /// The library while the operators are registered.
    pub fn library(&self) -> &L {
        self.lib
    }
}

impl<L: OperatorLibrary> Drop for GemsScope<'_, L> {
    fn drop(&mut self) {
        for op in self.registered.drain(..) {
            self.lib.deregister(op.name(), op.dispatch_key());
        }
    }
}

impl<L: OperatorLibrary> fmt::Debug for GemsScope<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GemsScope").field("registered", &self.registered.len()).finish()
    }
}
