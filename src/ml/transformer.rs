// ============================================================
// Layer 5 — Crossmodal Transformer Encoder
// ============================================================
// The building block of the MulT architecture: a stack of
// pre-LayerNorm transformer layers that can run in two modes.
//
//   Self mode:  the sequence attends to itself
//               (used by the memory stacks after fusion)
//   Cross mode: a target sequence queries a source sequence
//               (e.g. text queries audio — "which audio frames
//               explain this word?")
//
// Cross-attention is what lets unaligned modalities interact:
// the target keeps its own length, and every target step picks
// the source steps it cares about through attention weights.
//
// Why pre-LayerNorm (norm before the sub-block, residual after)?
//   Post-LN transformers need learning-rate warmup to train
//   stably; pre-LN keeps gradients well scaled from epoch one,
//   which matters at this small model size.
//
// Future masking:
//   With --no-attn-mask absent, attention is causal: a query at
//   position i may only see source positions j <= i + |S - T|
//   where T and S are the target/source lengths. The |S - T|
//   offset lines the ends of the two sequences up, so the last
//   query step can see the whole source. The mask is built
//   host-side as booleans (true = blocked) and handed to Burn's
//   MultiHeadAttention, which fills blocked scores with -inf.
//
// Reference: Burn Book §4 (Modules), Vaswani et al. (2017),
//            Tsai et al. (2019) "Multimodal Transformer"

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::{activation, TensorData},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct CrossmodalTransformerConfig {
    /// Width of the stream flowing through the stack
    pub embed_dim:     usize,
    /// Attention heads per layer (embed_dim must divide evenly)
    pub num_heads:     usize,
    /// Number of transformer layers
    pub layers:        usize,
    /// Dropout on the attention weights
    pub attn_dropout:  f64,
    /// Dropout after the ReLU inside the feed-forward block
    pub relu_dropout:  f64,
    /// Dropout on each residual branch before the add
    pub res_dropout:   f64,
    /// Dropout right after scaling + positional encoding
    pub embed_dropout: f64,
    /// Apply the causal future mask in every attention call
    pub attn_mask:     bool,
    /// Longest sequence the positional table must cover
    pub max_seq_len:   usize,
}

impl CrossmodalTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossmodalTransformer<B> {
        let positions = PositionalEncodingConfig::new(self.embed_dim)
            .with_max_sequence_size(self.max_seq_len.max(1))
            .init(device);
        let layers: Vec<CrossmodalLayer<B>> = (0..self.layers)
            .map(|_| self.build_layer(device))
            .collect();
        let final_norm    = LayerNormConfig::new(self.embed_dim).init(device);
        let embed_dropout = DropoutConfig::new(self.embed_dropout).init();
        CrossmodalTransformer {
            positions, layers, final_norm, embed_dropout,
            // √d scaling keeps the input magnitude comparable to
            // the positional sinusoids before they are summed
            embed_scale: (self.embed_dim as f64).sqrt(),
            attn_mask:   self.attn_mask,
        }
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> CrossmodalLayer<B> {
        let attn = MultiHeadAttentionConfig::new(self.embed_dim, self.num_heads)
            .with_dropout(self.attn_dropout)
            .init(device);
        // Feed-forward expands 4x then contracts, as in the
        // original transformer
        let fc1 = LinearConfig::new(self.embed_dim, 4 * self.embed_dim).init(device);
        let fc2 = LinearConfig::new(4 * self.embed_dim, self.embed_dim).init(device);
        let norm_attn    = LayerNormConfig::new(self.embed_dim).init(device);
        let norm_ffn     = LayerNormConfig::new(self.embed_dim).init(device);
        let relu_dropout = DropoutConfig::new(self.relu_dropout).init();
        let res_dropout  = DropoutConfig::new(self.res_dropout).init();
        CrossmodalLayer { attn, fc1, fc2, norm_attn, norm_ffn, relu_dropout, res_dropout }
    }
}

/// One pre-LN transformer layer. `source` switches it between
/// self-attention (None) and cross-attention (Some).
#[derive(Module, Debug)]
pub struct CrossmodalLayer<B: Backend> {
    pub attn:         MultiHeadAttention<B>,
    pub fc1:          Linear<B>,
    pub fc2:          Linear<B>,
    pub norm_attn:    LayerNorm<B>,
    pub norm_ffn:     LayerNorm<B>,
    pub relu_dropout: Dropout,
    pub res_dropout:  Dropout,
}

impl<B: Backend> CrossmodalLayer<B> {
    pub fn forward(
        &self,
        x:      Tensor<B, 3>,
        source: Option<Tensor<B, 3>>,
        mask:   Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 3> {
        // ── Attention sub-block ──
        let residual = x.clone();
        // Pre-LN: normalise before attention, not after the add.
        // The same norm is shared by query, key and value so both
        // streams live in the same scale.
        let q = self.norm_attn.forward(x);
        let input = match source {
            Some(s) => {
                let kv = self.norm_attn.forward(s);
                MhaInput::new(q, kv.clone(), kv)
            }
            None => MhaInput::self_attn(q),
        };
        let input = match mask {
            Some(m) => input.mask_attn(m),
            None    => input,
        };
        let attn = self.attn.forward(input).context;
        let x = residual + self.res_dropout.forward(attn);

        // ── Feed-forward sub-block ──
        let residual = x.clone();
        let h = self.norm_ffn.forward(x);
        let h = self.relu_dropout.forward(activation::relu(self.fc1.forward(h)));
        let h = self.res_dropout.forward(self.fc2.forward(h));
        residual + h
    }
}

#[derive(Module, Debug)]
pub struct CrossmodalTransformer<B: Backend> {
    pub positions:     PositionalEncoding<B>,
    pub layers:        Vec<CrossmodalLayer<B>>,
    pub final_norm:    LayerNorm<B>,
    pub embed_dropout: Dropout,
    pub embed_scale:   f64,
    pub attn_mask:     bool,
}

impl<B: Backend> CrossmodalTransformer<B> {
    /// Scale, add sinusoidal positions, apply embedding dropout.
    /// Attention is permutation-invariant, so position must be
    /// injected explicitly before the first layer.
    fn embed(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x * self.embed_scale;
        let x = self.positions.forward(x);
        self.embed_dropout.forward(x)
    }

    /// Self-attention mode: [batch, seq, dim] → [batch, seq, dim]
    pub fn forward_self(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq, _] = x.dims();
        let mask  = self.future_mask(batch, seq, seq, &x.device());
        let mut h = self.embed(x);
        for layer in &self.layers {
            h = layer.forward(h, None, mask.clone());
        }
        self.final_norm.forward(h)
    }

    /// Cross-attention mode: the target queries the source.
    /// [batch, t_len, dim] x [batch, s_len, dim] → [batch, t_len, dim]
    pub fn forward_cross(&self, target: Tensor<B, 3>, source: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, t_len, _] = target.dims();
        let s_len = source.dims()[1];
        let mask  = self.future_mask(batch, t_len, s_len, &target.device());
        let mut h = self.embed(target);
        // The source is embedded once and reused by every layer
        let s = self.embed(source);
        for layer in &self.layers {
            h = layer.forward(h, Some(s.clone()), mask.clone());
        }
        self.final_norm.forward(h)
    }

    /// Build the rectangular future mask as a device tensor,
    /// or None when masking is disabled.
    fn future_mask(
        &self,
        batch:  usize,
        q_len:  usize,
        s_len:  usize,
        device: &B::Device,
    ) -> Option<Tensor<B, 3, Bool>> {
        if !self.attn_mask {
            return None;
        }
        let rows = future_mask_rows(q_len, s_len);
        let mask = Tensor::<B, 2, Bool>::from_data(TensorData::new(rows, [q_len, s_len]), device);
        // [q, s] → [1, q, s] → broadcast over the batch
        Some(mask.unsqueeze::<3>().expand([batch, q_len, s_len]))
    }
}

/// Host-side future-mask layout, row-major over [q_len, s_len].
/// true = the query step may NOT attend to that source step.
///
/// Query step i sees source steps j <= i + |s_len - q_len|: the
/// offset aligns the sequence ends, so the final query step
/// always sees the full source.
pub fn future_mask_rows(q_len: usize, s_len: usize) -> Vec<bool> {
    let offset = q_len.abs_diff(s_len);
    (0..q_len)
        .flat_map(|i| (0..s_len).map(move |j| j > i + offset))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn test_config(attn_mask: bool) -> CrossmodalTransformerConfig {
        CrossmodalTransformerConfig::new(8, 2, 2, 0.0, 0.0, 0.0, 0.0, attn_mask, 16)
    }

    fn random_seq(batch: usize, len: usize, dim: usize) -> Tensor<TestBackend, 3> {
        let device = Default::default();
        Tensor::random(
            [batch, len, dim],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        )
    }

    #[test]
    fn test_square_future_mask_is_strictly_upper_triangular() {
        let rows = future_mask_rows(3, 3);
        // row-major [3, 3]; true above the main diagonal only
        assert_eq!(
            rows,
            vec![
                false, true,  true,
                false, false, true,
                false, false, false,
            ]
        );
    }

    #[test]
    fn test_longer_source_shifts_the_mask_right() {
        // q=2, s=4 → offset 2: step 0 sees sources 0..=2,
        // step 1 (the last) sees everything
        let rows = future_mask_rows(2, 4);
        assert_eq!(
            rows,
            vec![
                false, false, false, true,
                false, false, false, false,
            ]
        );
    }

    #[test]
    fn test_shorter_source_never_masks() {
        // q=4, s=2 → offset 2: even step 0 sees sources 0..=2,
        // which is already the whole source
        let rows = future_mask_rows(4, 2);
        assert!(rows.iter().all(|&m| !m));
    }

    #[test]
    fn test_self_mode_preserves_shape() {
        let device = Default::default();
        let encoder = test_config(true).init::<TestBackend>(&device);
        let out = encoder.forward_self(random_seq(3, 5, 8));
        assert_eq!(out.dims(), [3, 5, 8]);
    }

    #[test]
    fn test_cross_mode_keeps_target_length() {
        let device = Default::default();
        let encoder = test_config(true).init::<TestBackend>(&device);
        // Source has a different length — output follows the target
        let out = encoder.forward_cross(random_seq(2, 5, 8), random_seq(2, 9, 8));
        assert_eq!(out.dims(), [2, 5, 8]);
    }

    #[test]
    fn test_unmasked_cross_mode_runs() {
        let device = Default::default();
        let encoder = test_config(false).init::<TestBackend>(&device);
        let out = encoder.forward_cross(random_seq(2, 4, 8), random_seq(2, 6, 8));
        assert_eq!(out.dims(), [2, 4, 8]);
    }
}
