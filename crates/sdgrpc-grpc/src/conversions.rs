//! Type conversions between proto and domain types
//!
//! Handles conversion between gRPC protobuf types and the domain types the
//! engine manager works with, plus the mapping of engine errors to statuses.

use sdgrpc_domain::{
    EngineDescriptor, EngineError, EngineKind, GeneratedImage, GenerationRequest, ImageParams,
    LocalIdentity, WeightedPrompt,
};
use tonic::Status;

use crate::proto;

/// Error type for conversion failures
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConversionError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Enum value outside the schema
    #[error("Invalid {field} value: {value}")]
    InvalidEnum {
        /// Field carrying the value
        field: &'static str,
        /// Raw wire value
        value: i32,
    },

    /// Request asks for an output the gateway cannot produce
    #[error("Unsupported requested artifact type: {0:?}")]
    UnsupportedArtifact(proto::ArtifactType),

    /// Numeric parameter does not fit the domain range
    #[error("Parameter {field} out of range: {value}")]
    OutOfRange {
        /// Parameter name
        field: &'static str,
        /// Value as received
        value: u64,
    },

    /// Parameters rejected by domain validation
    #[error("{0}")]
    InvalidParameters(String),
}

impl From<ConversionError> for Status {
    fn from(e: ConversionError) -> Self {
        Status::invalid_argument(e.to_string())
    }
}

/// Convert domain EngineKind to proto EngineType
pub fn engine_kind_to_proto(kind: EngineKind) -> proto::EngineType {
    match kind {
        EngineKind::Text => proto::EngineType::Text,
        EngineKind::Picture => proto::EngineType::Picture,
        EngineKind::Audio => proto::EngineType::Audio,
        EngineKind::Video => proto::EngineType::Video,
        EngineKind::Classification => proto::EngineType::Classification,
        EngineKind::Storage => proto::EngineType::Storage,
    }
}

/// Convert an engine descriptor to proto EngineInfo
pub fn engine_to_proto(engine: &EngineDescriptor) -> proto::EngineInfo {
    proto::EngineInfo {
        id: engine.id.clone(),
        owner: engine.owner.clone(),
        ready: engine.ready,
        r#type: engine_kind_to_proto(engine.kind) as i32,
        tokenizer: proto::EngineTokenizer::Gpt2 as i32,
        name: engine.name.clone(),
        description: engine.description.clone(),
    }
}

/// Build the proto User for the local identity
pub fn identity_to_user(identity: &LocalIdentity) -> proto::User {
    proto::User {
        id: identity.user_id.clone(),
        auth_id: None,
        profile_picture: String::new(),
        email: identity.email.clone(),
        organizations: vec![proto::OrganizationMembership {
            organization_id: identity.organization_id.clone(),
            organization_name: identity.organization_name.clone(),
            role: proto::OrganizationRole::Owner as i32,
            is_default: true,
        }],
        created_at: identity.created_at,
        email_verified: true,
    }
}

/// Build the proto Organization for the local identity
pub fn identity_to_organization(identity: &LocalIdentity) -> proto::Organization {
    proto::Organization {
        id: identity.organization_id.clone(),
        name: identity.organization_name.clone(),
        description: "Local stable diffusion gateway".to_string(),
        member_ids: vec![identity.user_id.clone()],
    }
}

fn narrow(field: &'static str, value: u64) -> Result<u32, ConversionError> {
    u32::try_from(value).map_err(|_| ConversionError::OutOfRange { field, value })
}

/// Convert proto ImageParameters to domain ImageParams, filling defaults
///
/// Seeds missing for any sample are drawn at random so that every image the
/// engine returns carries the seed that reproduces it.
pub fn image_params_from_proto(
    params: Option<proto::ImageParameters>,
) -> Result<ImageParams, ConversionError> {
    let defaults = ImageParams::default();
    let Some(params) = params else {
        return Ok(with_seeds(defaults));
    };

    let resolved = ImageParams {
        width: params.width.map(|v| narrow("width", v)).transpose()?.unwrap_or(defaults.width),
        height: params
            .height
            .map(|v| narrow("height", v))
            .transpose()?
            .unwrap_or(defaults.height),
        samples: params
            .samples
            .map(|v| narrow("samples", v))
            .transpose()?
            .unwrap_or(defaults.samples),
        steps: params.steps.map(|v| narrow("steps", v)).transpose()?.unwrap_or(defaults.steps),
        cfg_scale: params.cfg_scale.unwrap_or(defaults.cfg_scale),
        eta: params.eta,
        strength: params.strength.unwrap_or(defaults.strength),
        seeds: params.seed,
    };

    resolved
        .validate()
        .map_err(|e| ConversionError::InvalidParameters(e.to_string()))?;

    Ok(with_seeds(resolved))
}

fn with_seeds(mut params: ImageParams) -> ImageParams {
    let wanted = params.samples as usize;
    params.seeds.truncate(wanted);
    while params.seeds.len() < wanted {
        params.seeds.push(rand::random());
    }
    params
}

/// Convert a proto generation Request to a domain GenerationRequest
pub fn generation_request_from_proto(
    request: proto::Request,
) -> Result<GenerationRequest, ConversionError> {
    let requested = proto::ArtifactType::try_from(request.requested_type).map_err(|_| {
        ConversionError::InvalidEnum {
            field: "requested_type",
            value: request.requested_type,
        }
    })?;
    match requested {
        proto::ArtifactType::ArtifactNone | proto::ArtifactType::ArtifactImage => {}
        other => return Err(ConversionError::UnsupportedArtifact(other)),
    }

    let mut prompts = Vec::new();
    let mut init_image = None;
    let mut mask_image = None;

    for prompt in request.prompt {
        let parameters = prompt.parameters.unwrap_or_default();
        match prompt.prompt {
            Some(proto::prompt::Prompt::Text(text)) => prompts.push(WeightedPrompt {
                text,
                weight: parameters.weight.unwrap_or(1.0),
            }),
            Some(proto::prompt::Prompt::Artifact(artifact)) => {
                let kind = proto::ArtifactType::try_from(artifact.r#type).map_err(|_| {
                    ConversionError::InvalidEnum {
                        field: "artifact.type",
                        value: artifact.r#type,
                    }
                })?;
                let Some(proto::artifact::Data::Binary(bytes)) = artifact.data else {
                    return Err(ConversionError::MissingField("artifact.binary"));
                };
                match kind {
                    proto::ArtifactType::ArtifactMask => mask_image = Some(bytes),
                    proto::ArtifactType::ArtifactImage => init_image = Some(bytes),
                    other => return Err(ConversionError::UnsupportedArtifact(other)),
                }
            }
            None => return Err(ConversionError::MissingField("prompt.prompt")),
        }
    }

    if prompts.is_empty() {
        return Err(ConversionError::MissingField("prompt.text"));
    }

    let params = match request.params {
        Some(proto::request::Params::Image(image)) => image_params_from_proto(Some(image))?,
        None => image_params_from_proto(None)?,
    };

    Ok(GenerationRequest {
        engine_id: Some(request.engine_id).filter(|id| !id.is_empty()),
        request_id: request.request_id,
        prompts,
        init_image,
        mask_image,
        params,
    })
}

/// Convert a generated image to a proto image Artifact
pub fn image_to_artifact(image: GeneratedImage, index: u32) -> proto::Artifact {
    proto::Artifact {
        id: u64::from(index),
        r#type: proto::ArtifactType::ArtifactImage as i32,
        mime: image.mime,
        data: Some(proto::artifact::Data::Binary(image.data)),
        index,
        finish_reason: proto::FinishReason::Stop as i32,
        seed: image.seed,
    }
}

/// Map an engine error to the status returned to the caller
pub fn status_from_engine_error(error: &EngineError) -> Status {
    match error {
        EngineError::UnknownEngine(_) => Status::not_found(error.to_string()),
        EngineError::NoDefaultEngine | EngineError::NotReady(_) => {
            Status::unavailable(error.to_string())
        }
        EngineError::InvalidRequest(_) => Status::invalid_argument(error.to_string()),
        EngineError::Pipeline { .. } => Status::internal(error.to_string()),
    }
}
