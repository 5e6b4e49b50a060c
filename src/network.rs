// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sign classification network.
//!
//! ```text
//! (B, 3, T, 47)
//!   ── conv1 (1×5) ─ bn1 ─ relu ── conv2 (1×3) ─ bn2 ─ relu ── maxpool (1×2) ── dropout
//!   ── temp_conv (3×1) ─ bn_temp ─ relu                              → (B, 64, T, 23)
//!   ── permute + flatten                                              → (B, T, 1472)
//!   ── bidirectional LSTM (256 per direction)                         → (B, T, 512)
//!   ── attention pooling over T                                       → (B, 512)
//!   ── bn ─ linear ─ relu ─ dropout ─ linear                          → (B, 67)
//! ```
//!
//! Parameter names follow the trained state dict, so a checkpoint written by the training code
//! loads without renaming.

use std::path::Path;

use candle_core::{DType, IndexOp, Module, ModuleT, Result, Tensor};
use candle_nn::rnn::{Direction, LSTM, LSTMConfig, RNN, lstm};
use candle_nn::{BatchNorm, Dropout, Init, Linear, VarBuilder, batch_norm, linear};

use crate::error::InferenceError;
use crate::inference::InferenceConfig;

const JOINT_KERNEL_1: usize = 5;
const JOINT_KERNEL_2: usize = 3;
const TEMPORAL_KERNEL: usize = 3;
const JOINT_POOL: usize = 2;

/// Network hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    /// Coordinates per joint.
    pub in_channels: usize,
    /// Convolution channels.
    pub channels: usize,
    /// Joints per frame before pooling.
    pub num_joints: usize,
    /// LSTM hidden width per direction.
    pub hidden_size: usize,
    /// Attention scorer hidden width.
    pub attention_hidden: usize,
    /// Classifier hidden width.
    pub fc_hidden: usize,
    /// Number of output logits.
    pub num_classes: usize,
    /// Dropout probability (inactive at inference).
    pub dropout: f32,
    /// Batch norm epsilon.
    pub bn_eps: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            channels: 64,
            num_joints: 47,
            hidden_size: 256,
            attention_hidden: 256,
            fc_hidden: 256,
            num_classes: 67,
            dropout: 0.3,
            bn_eps: 1e-5,
        }
    }
}

impl NetworkConfig {
    /// Default architecture sized for an inference configuration.
    #[must_use]
    pub fn from_inference(config: &InferenceConfig) -> Self {
        Self {
            num_joints: config.num_joints,
            num_classes: config.num_classes,
            ..Self::default()
        }
    }

    /// Joint axis size after pooling.
    #[must_use]
    pub const fn pooled_joints(&self) -> usize {
        self.num_joints / JOINT_POOL
    }

    /// Per-step LSTM input width.
    #[must_use]
    pub const fn lstm_input(&self) -> usize {
        self.channels * self.pooled_joints()
    }

    /// Width of the pooled context vector.
    #[must_use]
    pub const fn context_size(&self) -> usize {
        2 * self.hidden_size
    }

    /// Number of trainable parameters.
    #[must_use]
    pub const fn parameter_count(&self) -> usize {
        let (c_in, c) = (self.in_channels, self.channels);
        let conv = c * c_in * JOINT_KERNEL_1 + c
            + c * c * JOINT_KERNEL_2 + c
            + c * c * TEMPORAL_KERNEL + c;
        let bn = 3 * 2 * c;
        let h = self.hidden_size;
        let lstm = 2 * (4 * h * self.lstm_input() + 4 * h * h + 2 * 4 * h);
        let ctx = self.context_size();
        let attention = ctx * self.attention_hidden + self.attention_hidden + self.attention_hidden + 1;
        let head = 2 * ctx
            + ctx * self.fc_hidden + self.fc_hidden
            + self.fc_hidden * self.num_classes + self.num_classes;
        conv + bn + lstm + attention + head
    }
}

// ================================================================================================
// Layers
// ================================================================================================

/// 2-D convolution with a rectangular kernel and per-axis zero padding.
#[derive(Debug, Clone)]
struct RectConv2d {
    weight: Tensor,
    bias: Tensor,
    padding: (usize, usize),
}

impl RectConv2d {
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        padding: (usize, usize),
        vb: VarBuilder,
    ) -> Result<Self> {
        let weight = vb.get_with_hints(
            (out_channels, in_channels, kernel.0, kernel.1),
            "weight",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        #[allow(clippy::cast_precision_loss)]
        let bound = 1.0 / ((in_channels * kernel.0 * kernel.1) as f64).sqrt();
        let bias = vb.get_with_hints(
            out_channels,
            "bias",
            Init::Uniform {
                lo: -bound,
                up: bound,
            },
        )?;
        Ok(Self {
            weight,
            bias,
            padding,
        })
    }
}

impl Module for RectConv2d {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (ph, pw) = self.padding;
        let x = x.pad_with_zeros(2, ph, ph)?.pad_with_zeros(3, pw, pw)?;
        let y = x.conv2d(&self.weight, 0, 1, 1, 1)?;
        let bias = self.bias.reshape((1, self.bias.dim(0)?, 1, 1))?;
        y.broadcast_add(&bias)
    }
}

/// Convolution, batch norm, ReLU.
#[derive(Debug, Clone)]
struct ConvBnRelu {
    conv: RectConv2d,
    bn: BatchNorm,
}

impl ConvBnRelu {
    #[allow(clippy::too_many_arguments)]
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        padding: (usize, usize),
        eps: f64,
        vb: &VarBuilder,
        conv_name: &str,
        bn_name: &str,
    ) -> Result<Self> {
        Ok(Self {
            conv: RectConv2d::new(in_channels, out_channels, kernel, padding, vb.pp(conv_name))?,
            bn: batch_norm(out_channels, eps, vb.pp(bn_name))?,
        })
    }
}

impl Module for ConvBnRelu {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv.forward(x)?;
        self.bn.forward_t(&x, false)?.relu()
    }
}

// ================================================================================================
// Stages
// ================================================================================================

/// Joint-wise then temporal convolution.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    joint1: ConvBnRelu,
    joint2: ConvBnRelu,
    dropout: Dropout,
    temporal: ConvBnRelu,
}

impl FeatureEncoder {
    /// Build from `conv1`, `bn1`, `conv2`, `bn2`, `temp_conv` and `bn_temp`.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn new(config: &NetworkConfig, vb: &VarBuilder) -> Result<Self> {
        let (c_in, c, eps) = (config.in_channels, config.channels, config.bn_eps);
        Ok(Self {
            joint1: ConvBnRelu::new(c_in, c, (1, JOINT_KERNEL_1), (0, 2), eps, vb, "conv1", "bn1")?,
            joint2: ConvBnRelu::new(c, c, (1, JOINT_KERNEL_2), (0, 1), eps, vb, "conv2", "bn2")?,
            dropout: Dropout::new(config.dropout),
            temporal: ConvBnRelu::new(
                c,
                c,
                (TEMPORAL_KERNEL, 1),
                (1, 0),
                eps,
                vb,
                "temp_conv",
                "bn_temp",
            )?,
        })
    }

    /// `(B, 3, T, J)` to `(B, C, T, J / 2)`.
    ///
    /// # Errors
    ///
    /// Returns an error on a shape mismatch.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.joint1.forward(x)?;
        let x = self.joint2.forward(&x)?;
        let x = x.max_pool2d_with_stride((1, JOINT_POOL), (1, JOINT_POOL))?;
        let x = self.dropout.forward_t(&x, false)?;
        self.temporal.forward(&x)
    }
}

/// Single-layer bidirectional LSTM.
#[derive(Debug, Clone)]
pub struct ContextEncoder {
    forward: LSTM,
    backward: LSTM,
}

impl ContextEncoder {
    /// Build from the `weight_*_l0` and `weight_*_l0_reverse` tensors under `vb`.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn new(input_size: usize, hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let forward = lstm(input_size, hidden_size, LSTMConfig::default(), vb.clone())?;
        let backward_config = LSTMConfig {
            direction: Direction::Backward,
            ..LSTMConfig::default()
        };
        let backward = lstm(input_size, hidden_size, backward_config, vb)?;
        Ok(Self { forward, backward })
    }

    /// `(B, T, F)` to `(B, T, 2H)`, forward states first.
    ///
    /// # Errors
    ///
    /// Returns an error on a shape mismatch.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let fwd = run_direction(&self.forward, x, false)?;
        let bwd = run_direction(&self.backward, x, true)?;
        Tensor::cat(&[&fwd, &bwd], 2)
    }
}

/// `(B, C, T, J)` encoder output to `(B, T, C * J)` LSTM input.
///
/// Each step is flattened channel-major: feature `c * J + j` is channel `c` at joint `j`.
fn flatten_steps(features: &Tensor) -> Result<Tensor> {
    let (batch, channels, steps, joints) = features.dims4()?;
    features
        .permute((0, 2, 1, 3))?
        .contiguous()?
        .reshape((batch, steps, channels * joints))
}

/// Run one LSTM direction and return hidden states in time order.
fn run_direction(lstm: &LSTM, x: &Tensor, reverse: bool) -> Result<Tensor> {
    let (batch, steps, _) = x.dims3()?;
    let order: Vec<usize> = if reverse {
        (0..steps).rev().collect()
    } else {
        (0..steps).collect()
    };

    let mut state = lstm.zero_state(batch)?;
    let mut hidden = Vec::with_capacity(steps);
    for t in order {
        let input = x.i((.., t, ..))?.contiguous()?;
        state = lstm.step(&input, &state)?;
        hidden.push(state.h().clone());
    }
    if reverse {
        hidden.reverse();
    }
    Tensor::stack(&hidden, 1)
}

/// Learned softmax weighting over time steps.
#[derive(Debug, Clone)]
pub struct AttentionPool {
    score_hidden: Linear,
    score_out: Linear,
}

impl AttentionPool {
    /// Build from `0` (hidden projection) and `2` (scalar score) under `vb`.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn new(input_size: usize, hidden_size: usize, vb: &VarBuilder) -> Result<Self> {
        Ok(Self {
            score_hidden: linear(input_size, hidden_size, vb.pp("0"))?,
            score_out: linear(hidden_size, 1, vb.pp("2"))?,
        })
    }

    /// Pool `(B, T, D)` into `(B, D)`; also returns the `(B, T)` weights.
    ///
    /// # Errors
    ///
    /// Returns an error on a shape mismatch.
    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let scores = self.score_hidden.forward(x)?.tanh()?;
        let scores = self.score_out.forward(&scores)?.squeeze(2)?;
        let weights = candle_nn::ops::softmax(&scores, 1)?;
        let context = x.broadcast_mul(&weights.unsqueeze(2)?)?.sum(1)?;
        Ok((context, weights))
    }
}

/// Batch norm, hidden layer, output projection.
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    norm: BatchNorm,
    hidden: Linear,
    dropout: Dropout,
    out: Linear,
}

impl ClassifierHead {
    /// Build from `0` (batch norm), `1` and `4` (linear layers) under `vb`.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn new(config: &NetworkConfig, vb: &VarBuilder) -> Result<Self> {
        let ctx = config.context_size();
        Ok(Self {
            norm: batch_norm(ctx, config.bn_eps, vb.pp("0"))?,
            hidden: linear(ctx, config.fc_hidden, vb.pp("1"))?,
            dropout: Dropout::new(config.dropout),
            out: linear(config.fc_hidden, config.num_classes, vb.pp("4"))?,
        })
    }
}

impl Module for ClassifierHead {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.norm.forward_t(x, false)?;
        let x = self.hidden.forward(&x)?.relu()?;
        let x = self.dropout.forward_t(&x, false)?;
        self.out.forward(&x)
    }
}

// ================================================================================================
// Network
// ================================================================================================

/// The full classifier, in inference mode.
#[derive(Debug, Clone)]
pub struct SignNet {
    config: NetworkConfig,
    encoder: FeatureEncoder,
    context: ContextEncoder,
    attention: AttentionPool,
    head: ClassifierHead,
}

impl SignNet {
    /// Build from a variable builder rooted at the state-dict top level.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    pub fn from_var_builder(config: NetworkConfig, vb: &VarBuilder) -> Result<Self> {
        Ok(Self {
            encoder: FeatureEncoder::new(&config, vb)?,
            context: ContextEncoder::new(config.lstm_input(), config.hidden_size, vb.pp("lstm"))?,
            attention: AttentionPool::new(config.context_size(), config.attention_hidden, &vb.pp("attn"))?,
            head: ClassifierHead::new(&config, &vb.pp("fc"))?,
            config,
        })
    }

    /// Load a checkpoint: a PyTorch state dict (`.pt`, `.pth`, `.bin`) or `.safetensors`.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ModelLoadError`] if the file is missing, has an unknown
    /// extension, or its tensors do not match the architecture.
    pub fn load<P: AsRef<Path>>(
        path: P,
        config: NetworkConfig,
        device: &candle_core::Device,
    ) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(InferenceError::ModelLoadError(format!(
                "Checkpoint not found: {}",
                path.display()
            )));
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let load_err = |e: candle_core::Error| {
            InferenceError::ModelLoadError(format!("Failed to load {}: {e}", path.display()))
        };

        let vb = match ext.as_str() {
            "pt" | "pth" | "bin" => {
                VarBuilder::from_pth(path, DType::F32, device).map_err(load_err)?
            }
            // SAFETY: the checkpoint file is not modified while mapped.
            "safetensors" => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device).map_err(load_err)?
            },
            other => {
                return Err(InferenceError::ModelLoadError(format!(
                    "Unsupported checkpoint format '.{other}' for {}",
                    path.display()
                )));
            }
        };

        Self::from_var_builder(config, &vb).map_err(load_err)
    }

    /// Architecture parameters.
    #[must_use]
    pub const fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// `(B, 3, T, J)` joint tensor to `(B, num_classes)` logits.
    ///
    /// # Errors
    ///
    /// Returns an error if the input shape does not match the network.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.forward_with_attention(x)?.0)
    }

    /// Logits together with the `(B, T)` attention weights.
    ///
    /// # Errors
    ///
    /// Returns an error if the input shape does not match the network.
    pub fn forward_with_attention(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let (_, channels, _, joints) = x.dims4()?;
        if channels != self.config.in_channels || joints != self.config.num_joints {
            candle_core::bail!(
                "expected input (B, {}, T, {}), got {:?}",
                self.config.in_channels,
                self.config.num_joints,
                x.dims()
            );
        }

        let features = self.encoder.forward(x)?;
        let sequence = flatten_steps(&features)?;
        let context = self.context.forward(&sequence)?;
        let (pooled, weights) = self.attention.forward(&context)?;
        let logits = self.head.forward(&pooled)?;
        Ok((logits, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use candle_core::Device;
    use candle_nn::VarMap;

    fn small_config() -> NetworkConfig {
        NetworkConfig {
            channels: 8,
            hidden_size: 16,
            attention_hidden: 8,
            fc_hidden: 8,
            num_classes: 5,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_default_sizes() {
        let config = NetworkConfig::default();
        assert_eq!(config.pooled_joints(), 23);
        assert_eq!(config.lstm_input(), 1472);
        assert_eq!(config.context_size(), 512);
    }

    #[test]
    fn test_forward_shapes() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = SignNet::from_var_builder(NetworkConfig::default(), &vb)?;

        let x = Tensor::randn(0f32, 1f32, (2, 3, 32, 47), &device)?;
        let (logits, weights) = net.forward_with_attention(&x)?;
        assert_eq!(logits.dims(), &[2, 67]);
        assert_eq!(weights.dims(), &[2, 32]);
        Ok(())
    }

    #[test]
    fn test_attention_weights_sum_to_one() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = SignNet::from_var_builder(small_config(), &vb)?;

        let x = (Tensor::randn(0f32, 1f32, (3, 3, 12, 47), &device)? * 10.0)?;
        let (_, weights) = net.forward_with_attention(&x)?;
        for sum in weights.sum(1)?.to_vec1::<f32>()? {
            assert!((sum - 1.0).abs() < 1e-5, "attention sums to {sum}");
        }
        for w in weights.flatten_all()?.to_vec1::<f32>()? {
            assert!(w >= 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_zero_input_is_finite() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = SignNet::from_var_builder(small_config(), &vb)?;

        let logits = net.forward(&Tensor::zeros((1, 3, 32, 47), DType::F32, &device)?)?;
        assert!(logits.flatten_all()?.to_vec1::<f32>()?.iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_batch_elements_are_independent() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = SignNet::from_var_builder(small_config(), &vb)?;

        let a = Tensor::randn(0f32, 1f32, (1, 3, 8, 47), &device)?;
        let b = Tensor::randn(0f32, 1f32, (1, 3, 8, 47), &device)?;
        let batched = net.forward(&Tensor::cat(&[&a, &b], 0)?)?;
        let single = net.forward(&b)?;
        let diff = (batched.i(1)? - single.i(0)?)?.abs()?.max(0)?.to_scalar::<f32>()?;
        assert!(diff < 1e-4, "batch row differs by {diff}");
        Ok(())
    }

    #[test]
    fn test_wrong_input_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = SignNet::from_var_builder(small_config(), &vb)?;

        assert!(net.forward(&Tensor::zeros((1, 3, 32, 40), DType::F32, &device)?).is_err());
        assert!(net.forward(&Tensor::zeros((3, 32, 47), DType::F32, &device)?).is_err());
        Ok(())
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_steps_flatten_channel_major() -> Result<()> {
        let device = Device::Cpu;
        let (channels, steps, joints) = (3, 2, 4);
        let code = |c: usize, t: usize, j: usize| (c * 100 + t * 10 + j) as f32;

        let mut values = Vec::with_capacity(channels * steps * joints);
        for c in 0..channels {
            for t in 0..steps {
                for j in 0..joints {
                    values.push(code(c, t, j));
                }
            }
        }
        let features = Tensor::from_vec(values, (1, channels, steps, joints), &device)?;

        let sequence = flatten_steps(&features)?;
        assert_eq!(sequence.dims(), &[1, steps, channels * joints]);
        let rows = sequence.i(0)?.to_vec2::<f32>()?;
        for t in 0..steps {
            for c in 0..channels {
                for j in 0..joints {
                    assert_eq!(rows[t][c * joints + j], code(c, t, j), "c={c} t={t} j={j}");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_backward_states_follow_forward_states() -> Result<()> {
        let device = Device::Cpu;
        let (input, hidden, steps) = (3, 2, 5);
        let gates = 4 * hidden;

        let mut tensors = HashMap::new();
        for suffix in ["", "_reverse"] {
            tensors.insert(
                format!("weight_ih_l0{suffix}"),
                Tensor::zeros((gates, input), DType::F32, &device)?,
            );
            tensors.insert(
                format!("weight_hh_l0{suffix}"),
                Tensor::zeros((gates, hidden), DType::F32, &device)?,
            );
            tensors.insert(
                format!("bias_hh_l0{suffix}"),
                Tensor::zeros(gates, DType::F32, &device)?,
            );
        }
        // Zero weights keep the forward cell at zero. Gate order is i, f, g, o; only the
        // backward cell gate is driven, so its state grows with every step it has consumed.
        tensors.insert(
            "bias_ih_l0".to_string(),
            Tensor::zeros(gates, DType::F32, &device)?,
        );
        let reverse_bias: Vec<f32> = (0..gates)
            .map(|row| if row / hidden == 2 { 2.0 } else { 0.0 })
            .collect();
        tensors.insert(
            "bias_ih_l0_reverse".to_string(),
            Tensor::from_vec(reverse_bias, gates, &device)?,
        );

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let encoder = ContextEncoder::new(input, hidden, vb)?;
        let x = Tensor::randn(0f32, 1f32, (1, steps, input), &device)?;
        let out = encoder.forward(&x)?;
        assert_eq!(out.dims(), &[1, steps, 2 * hidden]);

        let rows = out.i(0)?.to_vec2::<f32>()?;
        for row in &rows {
            assert!(row[..hidden].iter().all(|&v| v == 0.0), "forward half {row:?}");
            assert!(row[hidden..].iter().all(|&v| v > 0.0), "backward half {row:?}");
        }
        // Step 0 has seen the whole clip in the backward pass, the last step only itself.
        for t in 1..steps {
            assert!(rows[t - 1][hidden] > rows[t][hidden], "step {t}: {rows:?}");
        }
        Ok(())
    }

    #[test]
    fn test_state_dict_names() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        SignNet::from_var_builder(NetworkConfig::default(), &vb)?;

        let data = varmap.data().lock().unwrap();
        for name in [
            "conv1.weight",
            "bn1.running_mean",
            "temp_conv.bias",
            "bn_temp.running_var",
            "lstm.weight_ih_l0",
            "lstm.weight_hh_l0_reverse",
            "lstm.bias_ih_l0_reverse",
            "attn.0.weight",
            "attn.2.bias",
            "fc.0.weight",
            "fc.1.weight",
            "fc.4.bias",
        ] {
            assert!(data.contains_key(name), "missing {name}");
        }
        assert_eq!(data["conv1.weight"].dims(), &[64, 3, 1, 5]);
        assert_eq!(data["temp_conv.weight"].dims(), &[64, 64, 3, 1]);
        assert_eq!(data["lstm.weight_ih_l0"].dims(), &[1024, 1472]);
        assert_eq!(data["fc.4.weight"].dims(), &[67, 256]);
        Ok(())
    }

    #[test]
    fn test_parameter_count() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = small_config();
        SignNet::from_var_builder(config, &vb)?;

        let trainable: usize = varmap
            .data()
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| !name.contains("running_"))
            .map(|(_, var)| var.elem_count())
            .sum();
        assert_eq!(trainable, config.parameter_count());
        Ok(())
    }

    #[test]
    fn test_safetensors_roundtrip() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = small_config();
        let net = SignNet::from_var_builder(config, &vb)?;

        let dir = tempfile::tempdir().map_err(candle_core::Error::wrap)?;
        let path = dir.path().join("model.safetensors");
        varmap.save(&path)?;

        let loaded = SignNet::load(&path, config, &device).map_err(candle_core::Error::wrap)?;
        let x = Tensor::randn(0f32, 1f32, (1, 3, 6, 47), &device)?;
        let diff = (net.forward(&x)? - loaded.forward(&x)?)?
            .abs()?
            .flatten_all()?
            .max(0)?
            .to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn test_load_failures() -> Result<()> {
        let device = Device::Cpu;
        let err = SignNet::load("/nonexistent/best_model.pt", NetworkConfig::default(), &device)
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));

        let dir = tempfile::tempdir().map_err(candle_core::Error::wrap)?;
        let onnx = dir.path().join("model.onnx");
        std::fs::write(&onnx, b"not a checkpoint").map_err(candle_core::Error::wrap)?;
        let err = SignNet::load(&onnx, NetworkConfig::default(), &device).unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));

        // Weights for a smaller architecture do not fit the default one.
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        SignNet::from_var_builder(small_config(), &vb)?;
        let small = dir.path().join("small.safetensors");
        varmap.save(&small)?;
        let err = SignNet::load(&small, NetworkConfig::default(), &device).unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));
        Ok(())
    }
}
