//! Generation module - requests handed to an engine manager and their results

use crate::error::EngineError;

/// Smallest accepted image edge, in pixels
pub const MIN_DIMENSION: u32 = 64;

/// Largest accepted image edge, in pixels
pub const MAX_DIMENSION: u32 = 2048;

/// Image edges must be a multiple of this
pub const DIMENSION_STEP: u32 = 64;

/// Largest number of images a single request may ask for
pub const MAX_SAMPLES: u32 = 16;

/// A text prompt with its relative weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPrompt {
    /// Prompt text
    pub text: String,

    /// Relative weight; negative weights act as negative prompts
    pub weight: f32,
}

impl WeightedPrompt {
    /// Create a prompt with the default weight of 1.0
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            weight: 1.0,
        }
    }
}

/// Sampling parameters for image generation
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Number of images to produce
    pub samples: u32,

    /// Diffusion steps
    pub steps: u32,

    /// Classifier-free guidance scale
    pub cfg_scale: f32,

    /// DDIM eta, sampler default when absent
    pub eta: Option<f32>,

    /// How far an init image may be moved (0.0 keeps it, 1.0 ignores it)
    pub strength: f32,

    /// One seed per sample
    pub seeds: Vec<u32>,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            samples: 1,
            steps: 50,
            cfg_scale: 7.0,
            eta: None,
            strength: 0.8,
            seeds: Vec::new(),
        }
    }
}

impl ImageParams {
    /// Check the parameters against the limits every engine shares
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(EngineError::InvalidRequest(format!(
                    "{name} must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {value}"
                )));
            }
            if value % DIMENSION_STEP != 0 {
                return Err(EngineError::InvalidRequest(format!(
                    "{name} must be a multiple of {DIMENSION_STEP}, got {value}"
                )));
            }
        }

        if !(1..=MAX_SAMPLES).contains(&self.samples) {
            return Err(EngineError::InvalidRequest(format!(
                "samples must be between 1 and {MAX_SAMPLES}, got {}",
                self.samples
            )));
        }

        if self.steps == 0 {
            return Err(EngineError::InvalidRequest("steps must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.strength) {
            return Err(EngineError::InvalidRequest(format!(
                "strength must be in [0, 1], got {}",
                self.strength
            )));
        }

        Ok(())
    }
}

/// A single image generation call as seen by the engine manager
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Target engine; `None` selects the manager's default engine
    pub engine_id: Option<String>,

    /// Caller supplied correlation id, echoed on every answer
    pub request_id: String,

    /// Text prompts, at least one
    pub prompts: Vec<WeightedPrompt>,

    /// Encoded init image for img2img
    pub init_image: Option<Vec<u8>>,

    /// Encoded mask for inpainting
    pub mask_image: Option<Vec<u8>>,

    /// Sampling parameters
    pub params: ImageParams,
}

impl GenerationRequest {
    /// Create a request for the default engine with a single prompt
    pub fn new(request_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            engine_id: None,
            request_id: request_id.into(),
            prompts: vec![WeightedPrompt::new(prompt)],
            init_image: None,
            mask_image: None,
            params: ImageParams::default(),
        }
    }

    /// Concatenated positive prompt text, the form most pipelines consume
    pub fn positive_prompt(&self) -> String {
        self.prompts
            .iter()
            .filter(|p| p.weight >= 0.0)
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One encoded image produced by a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Seed the image was sampled with
    pub seed: u32,

    /// MIME type of `data`
    pub mime: String,

    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl GeneratedImage {
    /// Create a PNG image result
    pub fn png(seed: u32, data: Vec<u8>) -> Self {
        Self {
            seed,
            mime: "image/png".to_string(),
            data,
        }
    }
}

/// Result of a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Engine that actually served the request
    pub engine_id: String,

    /// Images in sample order
    pub images: Vec<GeneratedImage>,
}
