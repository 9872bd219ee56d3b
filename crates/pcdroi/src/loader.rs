use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::{LoaderConfig, RoiGenerationConfig};
use crate::error::PcdError;
use crate::geometry::{assemble, DecodeResult};
use crate::io::pcd::decode_pcd;
use crate::roi::{RandomRoiGenerator, Roi, RoiGenerator, RoiSet};

/// Something that can deliver the raw bytes of a file.
pub trait ByteSource {
    /// Fetch the contents stored at `location`.
    fn fetch(&self, location: &str) -> impl Future<Output = std::io::Result<Vec<u8>>> + Send;
}

/// Reads files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    base_path: Option<PathBuf>,
}

impl FileSource {
    /// Create a source resolving locations as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locations against `base_path`.
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    fn resolve(&self, location: &str) -> PathBuf {
        match &self.base_path {
            Some(base) => base.join(location),
            None => PathBuf::from(location),
        }
    }
}

impl ByteSource for FileSource {
    fn fetch(&self, location: &str) -> impl Future<Output = std::io::Result<Vec<u8>>> + Send {
        let path = self.resolve(location);
        async move { tokio::fs::read(path).await }
    }
}

/// Serves files from memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `location`.
    pub fn insert(&mut self, location: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(location.into(), data.into());
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with_file(mut self, location: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(location, data);
        self
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self, location: &str) -> impl Future<Output = std::io::Result<Vec<u8>>> + Send {
        let res = self.files.get(location).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {location}"),
            )
        });
        async move { res }
    }
}

/// Scanned records first, then the points actually emitted.
fn load_summary(location: &str, result: &DecodeResult) -> String {
    format!(
        "Loaded {} points from {} ({} emitted)",
        result.points_scanned, location, result.point_count
    )
}

type BoxedGenerator = Box<dyn RoiGenerator + Send>;

/// Fetches PCD files and turns them into renderable [`DecodeResult`]s.
///
/// Every call owns its own header, color table, regions and buffers, so one
/// loader can serve concurrent loads.
pub struct PcdLoader<S> {
    source: S,
    config: LoaderConfig,
    generator: Mutex<Option<BoxedGenerator>>,
}

impl<S: ByteSource> PcdLoader<S> {
    /// Create a loader with the default configuration and no regions.
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: LoaderConfig::default(),
            generator: Mutex::new(None),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a fixed list of regions for every load.
    pub fn with_rois(mut self, rois: Vec<Roi>) -> Self {
        self.config.rois = RoiSet::new(rois);
        self
    }

    /// Synthesize regions with `generator` when no explicit list is set.
    pub fn with_generator(mut self, generator: impl RoiGenerator + Send + 'static) -> Self {
        *self.generator.get_mut().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(generator));
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    fn resolve_rois(&self) -> Result<RoiSet, PcdError> {
        if !self.config.rois.is_empty() {
            return Ok(self.config.rois.clone());
        }

        let mut generator = self.generator.lock().unwrap_or_else(|e| e.into_inner());
        let generation = match (&self.config.generate_rois, generator.is_some()) {
            (Some(generation), _) => generation.clone(),
            (None, true) => RoiGenerationConfig::default(),
            (None, false) => return Ok(RoiSet::default()),
        };
        generation.bounds.validate()?;

        let generator = generator.get_or_insert_with(|| -> BoxedGenerator {
            Box::new(RandomRoiGenerator::new(generation.seed))
        });
        let rois = generator.generate(generation.count, &generation.bounds);
        log::debug!("generated {} regions of interest", rois.len());
        Ok(RoiSet::new(rois))
    }

    /// Decode a PCD file that is already in memory.
    ///
    /// # Arguments
    ///
    /// * `data` - The complete file contents.
    /// * `point_size` - Rendering hint copied into the result.
    pub fn parse(&self, data: &[u8], point_size: f32) -> Result<DecodeResult, PcdError> {
        let rois = self.resolve_rois()?;
        let (header, points) = decode_pcd(data, &self.config.decoder, &rois)?;
        log::debug!(
            "header: {} fields, {} points, {} data",
            header.fields.len(),
            header.points,
            header.encoding
        );
        Ok(assemble(points, &rois, &self.config.decoder, point_size))
    }

    /// Fetch and decode the PCD file at `location`.
    ///
    /// Only the fetch suspends. Dropping the future discards everything it holds.
    pub async fn load(&self, location: &str, point_size: f32) -> Result<DecodeResult, PcdError> {
        let data = self
            .source
            .fetch(location)
            .await
            .map_err(|source| PcdError::FetchFailure {
                location: location.to_string(),
                source,
            })?;

        let result = self.parse(&data, point_size)?;
        log::info!("{}", load_summary(location, &result));
        Ok(result)
    }

    /// Load and hand the outcome to continuations.
    ///
    /// `on_load` receives the result. On failure the error goes to `on_error`,
    /// or is returned when no error continuation is given.
    pub async fn load_with<F, E>(
        &self,
        location: &str,
        point_size: f32,
        on_load: F,
        on_error: Option<E>,
    ) -> Result<(), PcdError>
    where
        F: FnOnce(DecodeResult),
        E: FnOnce(PcdError),
    {
        match (self.load(location, point_size).await, on_error) {
            (Ok(result), _) => {
                on_load(result);
                Ok(())
            }
            (Err(err), Some(on_error)) => {
                on_error(err);
                Ok(())
            }
            (Err(err), None) => Err(err),
        }
    }
}
