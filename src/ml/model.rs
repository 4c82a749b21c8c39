use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct PneumoniaCnnConfig {
    #[config(default = 1)]
    pub in_channels:   usize,
    #[config(default = 3)]
    pub num_classes:   usize,
    /// Channels of conv1; every following block doubles it
    #[config(default = 16)]
    pub base_channels: usize,
    #[config(default = 5)]
    pub num_blocks:    usize,
    #[config(default = 64)]
    pub dense_units:   usize,
}

impl PneumoniaCnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PneumoniaCnn<B> {
        let mut blocks = Vec::with_capacity(self.num_blocks);
        let mut in_ch  = self.in_channels;
        for i in 0..self.num_blocks {
            let out_ch = self.block_channels(i);
            // The last block feeds global pooling directly, so it keeps its resolution
            let downsample = i + 1 < self.num_blocks;
            blocks.push(self.build_block(in_ch, out_ch, downsample, device));
            in_ch = out_ch;
        }

        let gap   = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dense = LinearConfig::new(in_ch, self.dense_units).init(device);
        let head  = LinearConfig::new(self.dense_units, self.num_classes).init(device);
        PneumoniaCnn { blocks, gap, dense, head, activation: Relu::new() }
    }

    fn build_block<B: Backend>(
        &self,
        in_ch:      usize,
        out_ch:     usize,
        downsample: bool,
        device:     &B::Device,
    ) -> ConvBlock<B> {
        let conv = Conv2dConfig::new([in_ch, out_ch], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = downsample.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init());
        ConvBlock { conv, pool, activation: Relu::new() }
    }

    /// Output channels of block `i` (0-based)
    pub fn block_channels(&self, i: usize) -> usize {
        self.base_channels << i
    }

    /// Name of the last convolutional layer, the usual Grad-CAM target
    pub fn last_conv_layer(&self) -> String {
        layer_name(self.num_blocks.saturating_sub(1))
    }

    /// Reject configurations the network cannot be built from.
    pub fn validate(&self, expected_classes: usize) -> Result<(), String> {
        if self.num_blocks == 0 {
            return Err("num_blocks must be at least 1".into());
        }
        if self.in_channels == 0 || self.base_channels == 0 || self.dense_units == 0 {
            return Err("channel and unit counts must be positive".into());
        }
        if self.num_classes != expected_classes {
            return Err(format!(
                "model has {} classes, expected {expected_classes}",
                self.num_classes
            ));
        }
        Ok(())
    }
}

/// Public id of block `i`: conv1, conv2, ...
pub fn layer_name(i: usize) -> String {
    format!("conv{}", i + 1)
}

/// 3×3 conv → ReLU → optional 2×2 max-pool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:       Conv2d<B>,
    pub pool:       Option<MaxPool2d>,
    pub activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    /// Conv + ReLU: the tensor Grad-CAM looks at
    pub fn activate(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.activation.forward(self.conv.forward(x))
    }

    pub fn downsample(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.pool {
            Some(pool) => pool.forward(x),
            None       => x,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.downsample(self.activate(x))
    }
}

#[derive(Module, Debug)]
pub struct PneumoniaCnn<B: Backend> {
    pub blocks:     Vec<ConvBlock<B>>,
    pub gap:        AdaptiveAvgPool2d,
    pub dense:      Linear<B>,
    pub head:       Linear<B>,
    pub activation: Relu,
}

impl<B: Backend> PneumoniaCnn<B> {
    pub fn layer_names(&self) -> Vec<String> {
        (0..self.blocks.len()).map(layer_name).collect()
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        (0..self.blocks.len()).find(|&i| layer_name(i) == name)
    }

    /// images: [batch, 1, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.classify(x)
    }

    /// Run up to and including block `layer`'s ReLU (before its pooling).
    pub fn forward_to(&self, images: Tensor<B, 4>, layer: usize) -> Tensor<B, 4> {
        let mut x = images;
        for block in &self.blocks[..layer] {
            x = block.forward(x);
        }
        self.blocks[layer].activate(x)
    }

    /// Continue from an activation produced by `forward_to(_, layer)`.
    pub fn forward_from(&self, activation: Tensor<B, 4>, layer: usize) -> Tensor<B, 2> {
        let mut x = self.blocks[layer].downsample(activation);
        for block in &self.blocks[layer + 1..] {
            x = block.forward(x);
        }
        self.classify(x)
    }

    fn classify(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, _, _] = features.dims();
        let pooled = self.gap.forward(features).reshape([batch, channels]);
        let hidden = self.activation.forward(self.dense.forward(pooled));
        self.head.forward(hidden)
    }
}
