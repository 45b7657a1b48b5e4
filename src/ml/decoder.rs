// ============================================================
// Layer 5 — RNN + FC Decoder (Burn)
// ============================================================
// Maps preprocessed features to synthesizer controls.
//
//   feature_1 ─► FcStack ─┐
//   feature_k ─► FcStack ─┼─► concat ─► GRU ─┐
//                         └──────────────────┴─► concat ─► FcStack ─► Linear
//
// The final Linear projects to 1 + N + M channels which are
// split into:
//   amps                   [batch, time, 1]
//   harmonic_distribution  [batch, time, N]
//   noise_magnitudes       [batch, time, M]
//
// Each FcStack layer is Linear → LayerNorm → leaky ReLU.
//
// Reference: Burn Book §3 (Building Blocks)
//            Engel et al. (2020) DDSP

use burn::{
    nn::{
        gru::{Gru, GruConfig},
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

const LEAKY_RELU_SLOPE: f64 = 0.2;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
#[derive(Config, Debug)]
pub struct RnnFcDecoderConfig {
    /// Number of feature streams (one FC stack each)
    pub n_inputs: usize,
    #[config(default = 512)]
    pub rnn_channels: usize,
    #[config(default = 512)]
    pub ch: usize,
    #[config(default = 3)]
    pub layers_per_stack: usize,
    #[config(default = 60)]
    pub n_harmonic_distribution: usize,
    #[config(default = 65)]
    pub n_noise_magnitudes: usize,
}

impl RnnFcDecoderConfig {
    pub fn n_outputs(&self) -> usize {
        1 + self.n_harmonic_distribution + self.n_noise_magnitudes
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnFcDecoder<B> {
        let input_stacks = (0..self.n_inputs)
            .map(|_| fc_stack(1, self.ch, self.layers_per_stack, device))
            .collect();
        let rnn = GruConfig::new(self.ch * self.n_inputs, self.rnn_channels, true).init(device);
        let out_stack = fc_stack(
            self.ch * self.n_inputs + self.rnn_channels,
            self.ch,
            self.layers_per_stack,
            device,
        );
        let dense_out = LinearConfig::new(self.ch, self.n_outputs()).init(device);
        RnnFcDecoder {
            input_stacks,
            rnn,
            out_stack,
            dense_out,
            n_harmonic_distribution: self.n_harmonic_distribution,
            n_noise_magnitudes:      self.n_noise_magnitudes,
        }
    }
}

fn fc_stack<B: Backend>(d_input: usize, ch: usize, layers: usize, device: &B::Device) -> FcStack<B> {
    let layers = (0..layers.max(1))
        .map(|i| FcLayer {
            linear: LinearConfig::new(if i == 0 { d_input } else { ch }, ch).init(device),
            norm:   LayerNormConfig::new(ch).init(device),
        })
        .collect();
    FcStack { layers }
}

#[derive(Module, Debug)]
pub struct FcLayer<B: Backend> {
    pub linear: Linear<B>,
    pub norm:   LayerNorm<B>,
}

impl<B: Backend> FcLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.norm.forward(self.linear.forward(x));
        burn::tensor::activation::leaky_relu(x, LEAKY_RELU_SLOPE)
    }
}

#[derive(Module, Debug)]
pub struct FcStack<B: Backend> {
    pub layers: Vec<FcLayer<B>>,
}

impl<B: Backend> FcStack<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct RnnFcDecoder<B: Backend> {
    pub input_stacks:            Vec<FcStack<B>>,
    pub rnn:                     Gru<B>,
    pub out_stack:               FcStack<B>,
    pub dense_out:               Linear<B>,
    pub n_harmonic_distribution: usize,
    pub n_noise_magnitudes:      usize,
}

/// Named output splits of the decoder.
#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    pub amps:                  Tensor<B, 3>,
    pub harmonic_distribution: Tensor<B, 3>,
    pub noise_magnitudes:      Tensor<B, 3>,
}

impl<B: Backend> DecoderOutput<B> {
    pub fn splits(&self) -> [(&'static str, &Tensor<B, 3>); 3] {
        [
            ("amps", &self.amps),
            ("harmonic_distribution", &self.harmonic_distribution),
            ("noise_magnitudes", &self.noise_magnitudes),
        ]
    }
}

impl<B: Backend> RnnFcDecoder<B> {
    pub fn n_inputs(&self) -> usize {
        self.input_stacks.len()
    }

    /// features: one [batch, time, 1] tensor per input stack, in order.
    pub fn forward(&self, features: Vec<Tensor<B, 3>>) -> DecoderOutput<B> {
        let stacked: Vec<Tensor<B, 3>> = self
            .input_stacks
            .iter()
            .zip(features)
            .map(|(stack, x)| stack.forward(x))
            .collect();

        let rnn_out = self.rnn.forward(Tensor::cat(stacked.clone(), 2), None);

        let mut parts = stacked;
        parts.push(rnn_out);
        let x = self.out_stack.forward(Tensor::cat(parts, 2));
        let out = self.dense_out.forward(x); // [batch, time, 1 + N + M]

        let [batch, time, _] = out.dims();
        let n = self.n_harmonic_distribution;
        let m = self.n_noise_magnitudes;
        DecoderOutput {
            amps:                  out.clone().slice([0..batch, 0..time, 0..1]),
            harmonic_distribution: out.clone().slice([0..batch, 0..time, 1..1 + n]),
            noise_magnitudes:      out.slice([0..batch, 0..time, 1 + n..1 + n + m]),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn small(n_inputs: usize) -> RnnFcDecoderConfig {
        RnnFcDecoderConfig::new(n_inputs)
            .with_rnn_channels(8)
            .with_ch(6)
            .with_layers_per_stack(2)
            .with_n_harmonic_distribution(5)
            .with_n_noise_magnitudes(4)
    }

    #[test]
    fn test_output_split_shapes() {
        let device = Default::default();
        let decoder = small(1).init::<B>(&device);
        let f0 = Tensor::<B, 3>::ones([2, 7, 1], &device);
        let out = decoder.forward(vec![f0]);
        assert_eq!(out.amps.dims(), [2, 7, 1]);
        assert_eq!(out.harmonic_distribution.dims(), [2, 7, 5]);
        assert_eq!(out.noise_magnitudes.dims(), [2, 7, 4]);
    }

    #[test]
    fn test_two_input_streams() {
        let device = Default::default();
        let decoder = small(2).init::<B>(&device);
        assert_eq!(decoder.n_inputs(), 2);
        let x = Tensor::<B, 3>::zeros([1, 3, 1], &device);
        let out = decoder.forward(vec![x.clone(), x]);
        assert_eq!(out.noise_magnitudes.dims(), [1, 3, 4]);
    }

    #[test]
    fn test_default_channel_counts() {
        let cfg = RnnFcDecoderConfig::new(1);
        assert_eq!(cfg.n_outputs(), 1 + 60 + 65);
        assert_eq!(cfg.rnn_channels, 512);
    }
}
