use std::env;
use std::path::PathBuf;

use dlib_face_recognition::{
    FaceDetector, FaceDetectorTrait, FaceEncoderNetwork, FaceEncoderTrait, ImageMatrix,
    LandmarkPredictor, LandmarkPredictorTrait,
};
use serde::Serialize;
use tracing::debug;

use crate::capture::Frame;
use crate::errors::{AppError, AppResult};
use crate::faces::embedding::Embedding;

const LANDMARK_ENV: &str = "DLIB_LANDMARK_MODEL";
const ENCODER_ENV: &str = "DLIB_ENCODER_MODEL";

#[derive(Debug, Clone, Default)]
pub struct EmbedderConfig {
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
    pub jitters: u32,
}

#[derive(Debug, Clone)]
pub struct FaceModelPaths {
    pub landmark: PathBuf,
    pub encoder: PathBuf,
}

pub trait ModelPathResolver {
    fn resolve(&self, config: &EmbedderConfig) -> AppResult<FaceModelPaths>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModelPathResolver;

impl ModelPathResolver for EnvModelPathResolver {
    fn resolve(&self, config: &EmbedderConfig) -> AppResult<FaceModelPaths> {
        let landmark = config
            .landmark_model
            .clone()
            .or_else(|| env::var(LANDMARK_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "landmark predictor",
                flag: "--landmark-model",
                env: LANDMARK_ENV,
            })?;

        let encoder = config
            .encoder_model
            .clone()
            .or_else(|| env::var(ENCODER_ENV).ok().map(PathBuf::from))
            .ok_or(AppError::MissingModel {
                kind: "face encoding network",
                flag: "--encoder-model",
                env: ENCODER_ENV,
            })?;

        Ok(FaceModelPaths { landmark, encoder })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// The first face found in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub embedding: Embedding,
    pub bounding_box: BoundingBox,
}

/// Turns a frame into at most one face embedding.
///
/// `Ok(None)` means no face was found, which is an ordinary result.
pub trait Embedder {
    fn extract(&self, frame: &Frame) -> AppResult<Option<FaceDetection>>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn extract(&self, frame: &Frame) -> AppResult<Option<FaceDetection>> {
        (**self).extract(frame)
    }
}

pub struct DlibEmbedder {
    detector: FaceDetector,
    predictor: LandmarkPredictor,
    encoder: FaceEncoderNetwork,
    jitters: u32,
}

impl DlibEmbedder {
    pub fn from_config(config: &EmbedderConfig) -> AppResult<Self> {
        let models = EnvModelPathResolver.resolve(config)?;
        Self::new(&models, config.jitters)
    }

    pub fn new(models: &FaceModelPaths, jitters: u32) -> AppResult<Self> {
        debug!(path = %models.landmark.display(), "loading landmark model");
        let predictor =
            LandmarkPredictor::open(&models.landmark).map_err(|message| AppError::ModelLoad {
                path: models.landmark.clone(),
                message,
            })?;
        debug!(path = %models.encoder.display(), "loading encoder model");
        let encoder =
            FaceEncoderNetwork::open(&models.encoder).map_err(|message| AppError::ModelLoad {
                path: models.encoder.clone(),
                message,
            })?;
        let detector = FaceDetector::new();

        Ok(Self {
            detector,
            predictor,
            encoder,
            jitters,
        })
    }
}

impl Embedder for DlibEmbedder {
    fn extract(&self, frame: &Frame) -> AppResult<Option<FaceDetection>> {
        let matrix = ImageMatrix::from_image(frame);
        let locations = self.detector.face_locations(&matrix);
        let Some(rect) = locations.iter().next() else {
            return Ok(None);
        };
        debug!(faces = locations.len(), "detected faces; using the first");

        let landmarks = vec![self.predictor.face_landmarks(&matrix, rect)];
        let encodings = self
            .encoder
            .get_face_encodings(&matrix, &landmarks, self.jitters);
        let Some(encoding) = encodings.iter().next() else {
            return Ok(None);
        };

        Ok(Some(FaceDetection {
            embedding: Embedding::new(encoding.as_ref().to_vec()),
            bounding_box: BoundingBox {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_model_paths_win() {
        let config = EmbedderConfig {
            landmark_model: Some(PathBuf::from("/models/landmark.dat")),
            encoder_model: Some(PathBuf::from("/models/encoder.dat")),
            jitters: 1,
        };
        let models = EnvModelPathResolver.resolve(&config).unwrap();
        assert_eq!(models.landmark, PathBuf::from("/models/landmark.dat"));
        assert_eq!(models.encoder, PathBuf::from("/models/encoder.dat"));
    }

    #[test]
    fn missing_encoder_reports_flag_and_env() {
        std::env::remove_var(ENCODER_ENV);
        let config = EmbedderConfig {
            landmark_model: Some(PathBuf::from("/models/landmark.dat")),
            encoder_model: None,
            jitters: 1,
        };
        let err = EnvModelPathResolver.resolve(&config).unwrap_err();
        match err {
            AppError::MissingModel { flag, env, .. } => {
                assert_eq!(flag, "--encoder-model");
                assert_eq!(env, ENCODER_ENV);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
