// ============================================================
// Layer 5 — MulT Model
// ============================================================
// The crossmodal transformer (MulT) for multimodal sentiment.
//
// Data flow for the text target branch (audio/vision mirror it):
//
//   text [B, Tl, d_text] ──conv1x1──► [B, Tl, d]
//                                        │
//          ┌─────────────────────────────┤
//          ▼                             ▼
//   text ◄─ audio                 text ◄─ vision
//   (cross stack)                 (cross stack)
//          └────────── concat ───────────┘
//                        ▼
//                 memory stack (self-attention, width 2d)
//                        ▼
//                 last timestep  [B, 2d]
//
// The last timesteps of all active branches are concatenated
// and pushed through a residual projection head:
//
//   out_layer(proj2(dropout(relu(proj1(h)))) + h)  → [B, output_dim]
//
// Why 1x1 convolutions for the input projections?
//   Each modality arrives with its own feature width (e.g. 300-d
//   word vectors vs 74-d audio descriptors). A kernel-size-1
//   convolution is a per-timestep linear map that brings all
//   three to the shared model width d without mixing timesteps.
//   When a stream already has width d the projection is skipped
//   entirely (None).
//
// Why take only the last timestep of each branch?
//   With the future mask on, the last step is the only one that
//   has attended to the entire source sequences, so it carries
//   the most complete summary of the interaction.
//
// Reference: Burn Book §4 (Modules),
//            Tsai et al. (2019) "Multimodal Transformer"

use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};

use crate::domain::modality::Modality;
use crate::ml::transformer::{CrossmodalTransformer, CrossmodalTransformerConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct MultConfig {
    /// Raw feature width of the text stream
    pub orig_d_text:   usize,
    /// Raw feature width of the audio stream
    pub orig_d_audio:  usize,
    /// Raw feature width of the vision stream
    pub orig_d_vision: usize,

    /// Sequence lengths per modality (sizes the positional tables)
    pub text_len:   usize,
    pub audio_len:  usize,
    pub vision_len: usize,

    /// Which target branches to build (at least one)
    pub text_target:   bool,
    pub audio_target:  bool,
    pub vision_target: bool,

    /// Width of the model head output
    pub output_dim: usize,

    /// Shared model width after projection
    #[config(default = 30)]
    pub proj_dim: usize,

    /// Attention heads in every stack
    #[config(default = 5)]
    pub num_heads: usize,

    /// Layers per crossmodal stack (--nlevels)
    #[config(default = 5)]
    pub layers: usize,

    /// Layers in each branch's self-attention memory stack
    #[config(default = 3)]
    pub memory_layers: usize,

    /// Causal future masking in all attention calls
    #[config(default = true)]
    pub attn_mask: bool,

    /// Attention dropout when the source is text
    #[config(default = 0.1)]
    pub attn_dropout: f64,

    /// Attention dropout when the source is audio
    #[config(default = 0.0)]
    pub attn_dropout_a: f64,

    /// Attention dropout when the source is vision
    #[config(default = 0.0)]
    pub attn_dropout_v: f64,

    /// Dropout after the ReLU in feed-forward blocks
    #[config(default = 0.1)]
    pub relu_dropout: f64,

    /// Dropout on raw text input and inside every encoder embed
    #[config(default = 0.25)]
    pub embed_dropout: f64,

    /// Dropout on residual branches
    #[config(default = 0.1)]
    pub res_dropout: f64,

    /// Dropout inside the output projection head
    #[config(default = 0.0)]
    pub out_dropout: f64,
}

impl MultConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MultModel<B> {
        let proj_text   = self.projection(self.orig_d_text, device);
        let proj_audio  = self.projection(self.orig_d_audio, device);
        let proj_vision = self.projection(self.orig_d_vision, device);

        let text_branch = self
            .text_target
            .then(|| self.build_branch(Modality::Text, device));
        let audio_branch = self
            .audio_target
            .then(|| self.build_branch(Modality::Audio, device));
        let vision_branch = self
            .vision_target
            .then(|| self.build_branch(Modality::Vision, device));

        let combined = self.combined_dim();
        let proj1     = LinearConfig::new(combined, combined).init(device);
        let proj2     = LinearConfig::new(combined, combined).init(device);
        let out_layer = LinearConfig::new(combined, self.output_dim).init(device);

        MultModel {
            proj_text, proj_audio, proj_vision,
            text_branch, audio_branch, vision_branch,
            proj1, proj2, out_layer,
            embed_dropout: DropoutConfig::new(self.embed_dropout).init(),
            out_dropout:   DropoutConfig::new(self.out_dropout).init(),
        }
    }

    /// Fused width entering the projection head: each active
    /// branch contributes its 2d memory-stack output.
    pub fn combined_dim(&self) -> usize {
        let active = [self.text_target, self.audio_target, self.vision_target]
            .iter()
            .filter(|&&t| t)
            .count();
        2 * self.proj_dim * active
    }

    /// 1x1 convolution onto the shared width, or None when the
    /// raw features already have it.
    fn projection<B: Backend>(&self, orig_d: usize, device: &B::Device) -> Option<Conv1d<B>> {
        if orig_d == self.proj_dim {
            None
        } else {
            Some(
                Conv1dConfig::new(orig_d, self.proj_dim, 1)
                    .with_bias(false)
                    .init(device),
            )
        }
    }

    fn build_branch<B: Backend>(&self, target: Modality, device: &B::Device) -> TargetBranch<B> {
        // The two source modalities, in canonical order with the
        // target removed
        let (first, second) = match target {
            Modality::Text   => (Modality::Audio, Modality::Vision),
            Modality::Audio  => (Modality::Text,  Modality::Vision),
            Modality::Vision => (Modality::Text,  Modality::Audio),
        };
        TargetBranch {
            with_first:  self.cross_stack(first, device),
            with_second: self.cross_stack(second, device),
            memory:      self.memory_stack(device),
        }
    }

    fn cross_stack<B: Backend>(&self, source: Modality, device: &B::Device) -> CrossmodalTransformer<B> {
        CrossmodalTransformerConfig::new(
            self.proj_dim,
            self.num_heads,
            self.layers,
            self.source_attn_dropout(source),
            self.relu_dropout,
            self.res_dropout,
            self.embed_dropout,
            self.attn_mask,
            self.max_seq_len(),
        )
        .init(device)
    }

    fn memory_stack<B: Backend>(&self, device: &B::Device) -> CrossmodalTransformer<B> {
        CrossmodalTransformerConfig::new(
            2 * self.proj_dim,
            self.num_heads,
            self.memory_layers,
            self.attn_dropout,
            self.relu_dropout,
            self.res_dropout,
            self.embed_dropout,
            self.attn_mask,
            self.max_seq_len(),
        )
        .init(device)
    }

    /// Attention dropout follows the SOURCE modality, matching
    /// the per-source --attn-dropout[-a|-v] flags.
    fn source_attn_dropout(&self, source: Modality) -> f64 {
        match source {
            Modality::Text   => self.attn_dropout,
            Modality::Audio  => self.attn_dropout_a,
            Modality::Vision => self.attn_dropout_v,
        }
    }

    fn max_seq_len(&self) -> usize {
        self.text_len.max(self.audio_len).max(self.vision_len)
    }
}

/// One target branch: two crossmodal stacks fused into a
/// self-attention memory over the doubled width.
#[derive(Module, Debug)]
pub struct TargetBranch<B: Backend> {
    pub with_first:  CrossmodalTransformer<B>,
    pub with_second: CrossmodalTransformer<B>,
    pub memory:      CrossmodalTransformer<B>,
}

impl<B: Backend> TargetBranch<B> {
    /// target [B, T, d] x two sources → branch summary [B, 2d]
    pub fn forward(
        &self,
        target: Tensor<B, 3>,
        first:  Tensor<B, 3>,
        second: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let h_first  = self.with_first.forward_cross(target.clone(), first);
        let h_second = self.with_second.forward_cross(target, second);
        // Concatenate along the feature axis: [B, T, 2d]
        let fused = Tensor::cat(vec![h_first, h_second], 2);
        let mem   = self.memory.forward_self(fused);

        // Keep only the last timestep as the branch summary
        let [batch, seq, dim] = mem.dims();
        mem.slice([0..batch, seq - 1..seq, 0..dim])
            .reshape([batch, dim])
    }
}

#[derive(Module, Debug)]
pub struct MultModel<B: Backend> {
    pub proj_text:     Option<Conv1d<B>>,
    pub proj_audio:    Option<Conv1d<B>>,
    pub proj_vision:   Option<Conv1d<B>>,
    pub text_branch:   Option<TargetBranch<B>>,
    pub audio_branch:  Option<TargetBranch<B>>,
    pub vision_branch: Option<TargetBranch<B>>,
    pub proj1:         Linear<B>,
    pub proj2:         Linear<B>,
    pub out_layer:     Linear<B>,
    pub embed_dropout: Dropout,
    pub out_dropout:   Dropout,
}

impl<B: Backend> MultModel<B> {
    /// text [B, Tl, d_text], audio [B, Ta, d_audio],
    /// vision [B, Tv, d_vision] → predictions [B, output_dim]
    pub fn forward(
        &self,
        text:   Tensor<B, 3>,
        audio:  Tensor<B, 3>,
        vision: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        // Only the text stream gets input dropout: word vectors
        // are the densest of the three and overfit first
        let text = self.embed_dropout.forward(text);

        let text   = project(&self.proj_text, text);
        let audio  = project(&self.proj_audio, audio);
        let vision = project(&self.proj_vision, vision);

        let mut branches: Vec<Tensor<B, 2>> = Vec::new();
        if let Some(branch) = &self.text_branch {
            branches.push(branch.forward(text.clone(), audio.clone(), vision.clone()));
        }
        if let Some(branch) = &self.audio_branch {
            branches.push(branch.forward(audio.clone(), text.clone(), vision.clone()));
        }
        if let Some(branch) = &self.vision_branch {
            branches.push(branch.forward(vision, text, audio));
        }

        // ModalitySelection guarantees at least one branch
        let combined = Tensor::cat(branches, 1);

        // Residual projection head
        let projected = self.proj2.forward(
            self.out_dropout
                .forward(activation::relu(self.proj1.forward(combined.clone()))),
        );
        self.out_layer.forward(projected + combined)
    }
}

/// Apply the 1x1 projection in channel-major layout, or pass
/// the stream through untouched when no projection is needed.
fn project<B: Backend>(conv: &Option<Conv1d<B>>, x: Tensor<B, 3>) -> Tensor<B, 3> {
    match conv {
        // Conv1d expects [batch, channels, length]
        Some(conv) => conv.forward(x.swap_dims(1, 2)).swap_dims(1, 2),
        None       => x,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    // Small widths keep the tests fast; proportions follow the
    // real configuration (distinct raw dims, distinct lengths)
    fn small_config(text: bool, audio: bool, vision: bool, output_dim: usize) -> MultConfig {
        MultConfig::new(12, 6, 9, 7, 5, 6, text, audio, vision, output_dim)
            .with_proj_dim(8)
            .with_num_heads(2)
            .with_layers(1)
            .with_memory_layers(1)
    }

    fn streams(batch: usize) -> (
        Tensor<TestBackend, 3>,
        Tensor<TestBackend, 3>,
        Tensor<TestBackend, 3>,
    ) {
        let device = Default::default();
        let rand = |shape: [usize; 3]| {
            Tensor::random(shape, burn::tensor::Distribution::Uniform(-1.0, 1.0), &device)
        };
        (rand([batch, 7, 12]), rand([batch, 5, 6]), rand([batch, 6, 9]))
    }

    #[test]
    fn test_trimodal_forward_shape() {
        let device = Default::default();
        let model = small_config(true, true, true, 1).init::<TestBackend>(&device);
        let (text, audio, vision) = streams(2);
        assert_eq!(model.forward(text, audio, vision).dims(), [2, 1]);
    }

    #[test]
    fn test_single_target_forward_shape() {
        let device = Default::default();
        let model = small_config(false, true, false, 1).init::<TestBackend>(&device);
        let (text, audio, vision) = streams(3);
        assert_eq!(model.forward(text, audio, vision).dims(), [3, 1]);
        assert!(model.text_branch.is_none());
        assert!(model.vision_branch.is_none());
    }

    #[test]
    fn test_emotion_head_width() {
        let device = Default::default();
        let model = small_config(true, true, true, 8).init::<TestBackend>(&device);
        let (text, audio, vision) = streams(2);
        assert_eq!(model.forward(text, audio, vision).dims(), [2, 8]);
    }

    #[test]
    fn test_projection_skipped_when_width_already_matches() {
        let device = Default::default();
        // audio raw width equals proj_dim → identity projection
        let cfg = MultConfig::new(12, 8, 9, 7, 5, 6, true, true, true, 1)
            .with_proj_dim(8)
            .with_num_heads(2)
            .with_layers(1)
            .with_memory_layers(1);
        let model = cfg.init::<TestBackend>(&device);
        assert!(model.proj_audio.is_none());
        assert!(model.proj_text.is_some());
        assert!(model.proj_vision.is_some());
    }

    #[test]
    fn test_combined_dim_counts_active_branches() {
        assert_eq!(small_config(true, true, true, 1).combined_dim(), 48);
        assert_eq!(small_config(false, true, false, 1).combined_dim(), 16);
    }
}
