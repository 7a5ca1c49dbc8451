//! Neural network inference with [`tract_onnx`].

use std::{path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TVec, TValue, Tensor, TypedFact,
    TypedOp,
};

use crate::image::{Image, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Memory layout of a network's image input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Nchw,
    Nhwc,
}

/// A convolutional network that takes a single RGB image with color values in `[0, 1]`.
pub struct Network {
    model: Model,
    input_shape: Vec<usize>,
    input_res: Resolution,
    layout: Layout,
}

impl Network {
    /// Loads and optimizes a network from an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!("neural network file must have `.onnx` extension"),
        }

        let graph = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        let input_shape = model
            .model()
            .input_fact(0)?
            .shape
            .as_concrete()
            .context("network has a symbolic input shape")?
            .to_vec();
        let (layout, w, h) = match *input_shape {
            [1, 3, h, w] => (Layout::Nchw, w, h),
            [1, h, w, 3] => (Layout::Nhwc, w, h),
            _ => bail!("invalid network input shape {:?}", input_shape),
        };
        let input_res = Resolution::new(w.try_into()?, h.try_into()?);

        log::debug!(
            "loaded network '{}' ({:?}, {})",
            path.display(),
            layout,
            input_res
        );

        Ok(Self {
            model,
            input_shape,
            input_res,
            layout,
        })
    }

    /// Returns the resolution of the images the network takes.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `image`, which has to be of the network's input resolution.
    pub fn infer(&self, image: &Image) -> anyhow::Result<TVec<TValue>> {
        if image.resolution() != self.input_res {
            bail!(
                "network input must be {}, got {}",
                self.input_res,
                image.resolution()
            );
        }
        let input = tvec![TValue::from_const(Arc::new(self.to_tensor(image)?))];
        self.model.run(input)
    }

    fn to_tensor(&self, image: &Image) -> anyhow::Result<Tensor> {
        let (w, h) = (image.width(), image.height());
        let mut data = Vec::with_capacity(w as usize * h as usize * 3);
        let value = |x: u32, y: u32, c: usize| f32::from(image.get(x, y)[c]) / 255.0;
        match self.layout {
            Layout::Nchw => {
                for c in 0..3 {
                    for y in 0..h {
                        for x in 0..w {
                            data.push(value(x, y, c));
                        }
                    }
                }
            }
            Layout::Nhwc => {
                for y in 0..h {
                    for x in 0..w {
                        for c in 0..3 {
                            data.push(value(x, y, c));
                        }
                    }
                }
            }
        }
        Ok(Tensor::from_shape(&self.input_shape, &data)?)
    }
}

/// Returns output `index` as a flat `f32` slice of `expected_len` values.
pub(crate) fn output<'a>(
    outputs: &'a [TValue],
    index: usize,
    expected_len: usize,
) -> anyhow::Result<&'a [f32]> {
    let values = outputs
        .get(index)
        .with_context(|| format!("missing network output {}", index))?
        .as_slice::<f32>()?;
    if values.len() != expected_len {
        bail!(
            "network output {} has {} values, expected {}",
            index,
            values.len(),
            expected_len
        );
    }
    Ok(values)
}
