//! Neural network inference on the CPU.
//!
//! Networks are loaded from ONNX files at runtime and executed with [`tract_onnx`].

use std::{ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec,
    Tensor, TypedFact, TypedOp,
};

use crate::image::{Color, ImageView, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An optimized, runnable ONNX network.
pub struct NeuralNetwork {
    plan: Model,
}

impl NeuralNetwork {
    /// Loads and optimizes a network from an ONNX file.
    ///
    /// The path must have an `.onnx` extension.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let graph = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?
            .into_optimized()
            .with_context(|| format!("failed to optimize model '{}'", path.display()))?;
        let plan = SimplePlan::new(graph)?;
        log::info!(
            "loaded network '{}' ({} inputs, {} outputs)",
            path.display(),
            plan.model().inputs.len(),
            plan.model().outputs.len(),
        );

        Ok(Self { plan })
    }

    /// Returns the concrete shape of the input at `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.plan.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => bail!("network input {} has a symbolic shape", index),
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.plan.model().inputs.len()
    }

    /// Runs the network on a list of input tensors.
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: TVec<Tensor>) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .into_iter()
            .map(|tensor| TValue::from_const(Arc::new(tensor)))
            .collect();
        let inner = self.plan.run(inputs)?;
        Ok(Outputs { inner })
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

impl CnnInputShape {
    /// Detects the layout and resolution of a single-image RGB input tensor shape.
    ///
    /// `[1, 3, 3, 3]` is ambiguous and treated as NCHW.
    pub fn detect(shape: &[usize]) -> Option<(Self, Resolution)> {
        let (layout, w, h) = match *shape {
            [1, 3, h, w] => (Self::NCHW, w, h),
            [1, h, w, 3] => (Self::NHWC, w, h),
            _ => return None,
        };
        let (w, h) = (u32::try_from(w).ok()?, u32::try_from(h).ok()?);
        Some((layout, Resolution::new(w, h)))
    }
}

/// Maps sRGB pixel values to network input values.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    start: f32,
    scale: f32,
}

impl ColorMapper {
    /// Creates a mapper that uniformly maps `0..=255` to `target_range`.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let (start, end) = (*target_range.start(), *target_range.end());
        assert!(end > start, "empty color range {:?}", target_range);

        Self {
            start,
            scale: (end - start) / 255.0,
        }
    }

    pub fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|c| c as f32 * self.scale + self.start)
    }
}

/// A convolutional neural network that takes a single RGB image.
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Wraps `nn`, which must have exactly one NCHW or NHWC RGB input.
    pub fn new(nn: NeuralNetwork, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            bail!(
                "CNN has to take exactly 1 input, this one takes {}",
                nn.num_inputs()
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (shape, input_res) = CnnInputShape::detect(&tensor_shape)
            .with_context(|| format!("unsupported CNN input shape {:?}", tensor_shape))?;
        log::debug!("CNN input: {:?} {}", shape, input_res);

        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    /// Loads an ONNX file and wraps it with [`Cnn::new`].
    pub fn load<P: AsRef<Path>>(path: P, color_mapper: ColorMapper) -> anyhow::Result<Self> {
        Self::new(NeuralNetwork::load(path)?, color_mapper)
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `view`.
    ///
    /// The view is resampled to the input resolution, stretching it if the aspect ratios differ.
    pub fn estimate(&self, view: &ImageView<'_>) -> anyhow::Result<Outputs> {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );
        let pixel = |x: usize, y: usize| {
            self.color_mapper
                .map(view.sample(x as f32 / w as f32, y as f32 / h as f32))
        };

        let tensor: Tensor = match self.shape {
            CnnInputShape::NCHW => {
                Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| pixel(x, y)[c]).into()
            }
            CnnInputShape::NHWC => {
                Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| pixel(x, y)[c]).into()
            }
        };

        self.nn.estimate(tvec![tensor])
    }
}

/// The output tensors of one inference pass.
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns the values of output `index`, which must hold exactly `expected_len` `f32`s.
    pub fn values(&self, index: usize, expected_len: usize) -> anyhow::Result<&[f32]> {
        let tensor = match self.inner.get(index) {
            Some(tensor) => tensor,
            None => bail!("network has no output {} (only {})", index, self.len()),
        };
        let values = tensor.as_slice::<f32>()?;
        if values.len() != expected_len {
            bail!(
                "network output {} has shape {:?}, expected {} values",
                index,
                tensor.shape(),
                expected_len,
            );
        }
        Ok(values)
    }
}
