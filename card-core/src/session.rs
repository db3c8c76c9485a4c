//! The editing session: one scene plus the state that surrounds it.
//!
//! ```text
//!  interaction ──► route ──► selection
//!  mutation ─────► apply ──► scene
//!  bytes ──► begin_*_import ──(decode)──► complete_*_import ──► scene
//!  id ────► begin_template_load ─(fetch + decode)─► finish_template_load
//!  save ──► serialize ──► TemplateStore
//! ```
//!
//! Decoding and persistence suspend. Each suspended request hands out a
//! ticket which is consumed exactly once by its completion. A ticket that
//! no longer matches the session (target deleted, newer request started,
//! scene replaced) is discarded without touching the scene.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::asset::{Bitmap, EncodedImage, ImageDecoder};
use crate::config::EditorConfig;
use crate::element::{ElementId, ElementKind};
use crate::mutation::{Mutation, MutationOutcome};
use crate::scene::Scene;
use crate::selection::{EditorTab, Interaction, RouteOutcome};
use crate::store::{current_timestamp_ms, FileTemplateStore, StoreError, TemplateStore};
use crate::template::{self, TemplateId, TemplateRecord};
use crate::{CardError, CardResult};

/// Renders a scene for export and thumbnails.
pub trait SceneRenderer: Send + Sync {
    /// Render the scene to PNG at `pixel_density` device pixels per canvas unit.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Render`] if rendering fails.
    fn render_raster(&self, scene: &Scene, pixel_density: f32) -> CardResult<EncodedImage>;

    /// Render the scene into a single-page PDF sized to the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Render`] if rendering fails.
    fn render_pdf(&self, scene: &Scene) -> CardResult<Vec<u8>>;

    /// Render a small preview for a saved template.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Render`] if rendering fails.
    fn thumbnail(&self, scene: &Scene, pixel_density: f32) -> CardResult<EncodedImage> {
        self.render_raster(scene, pixel_density)
    }
}

/// State of the persistence collaborator.
#[derive(Clone)]
pub enum Persistence {
    /// The store opened and accepts requests.
    Available(Arc<dyn TemplateStore>),
    /// The store failed to open; every persistence request short-circuits.
    Unavailable(String),
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Tracks the last file chosen in the background file picker.
///
/// A picker only reports a change when the chosen file differs from the
/// current one, so this must be reset when the image it produced is removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileInput {
    selected: Option<String>,
}

impl FileInput {
    /// Record a pick. Returns `false` if it repeats the current file.
    pub fn select(&mut self, file_name: &str) -> bool {
        if self.selected.as_deref() == Some(file_name) {
            return false;
        }
        self.selected = Some(file_name.to_string());
        true
    }

    /// The currently selected file name.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Forget the current file.
    pub fn reset(&mut self) {
        self.selected = None;
    }
}

/// Image ids reserved by in-flight imports, keyed to the scene generation
/// they were reserved in.
#[derive(Debug, Default, Clone)]
struct PendingImages(Arc<Mutex<HashMap<ElementId, u64>>>);

impl PendingImages {
    fn lock(&self) -> MutexGuard<'_, HashMap<ElementId, u64>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, id: ElementId, generation: u64) {
        self.lock().insert(id, generation);
    }

    fn contains(&self, id: ElementId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Release a reservation made in `generation`. Returns whether it was held.
    fn release(&self, id: ElementId, generation: u64) -> bool {
        let mut pending = self.lock();
        if pending.get(&id) == Some(&generation) {
            pending.remove(&id);
            true
        } else {
            false
        }
    }

    fn cancel(&self, id: ElementId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Pending image import. Consumed by [`EditorSession::complete_image_import`].
///
/// Dropping the ticket without completing it releases the reserved id.
#[derive(Debug)]
#[must_use = "an import ticket must be completed"]
pub struct ImageImportTicket {
    id: ElementId,
    scene_generation: u64,
    pending: PendingImages,
}

impl Drop for ImageImportTicket {
    fn drop(&mut self) {
        if self.pending.release(self.id, self.scene_generation) {
            tracing::debug!("Released abandoned import of image {}", self.id);
        }
    }
}

impl ImageImportTicket {
    /// Id reserved for the image element.
    #[must_use]
    pub const fn id(&self) -> ElementId {
        self.id
    }
}

/// Pending background image import.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an import ticket must be completed"]
pub struct BackgroundImportTicket {
    generation: u64,
}

/// Pending template load.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a load ticket must be finished"]
pub struct LoadTicket {
    id: TemplateId,
    generation: u64,
}

impl LoadTicket {
    /// Template being loaded.
    #[must_use]
    pub const fn id(&self) -> TemplateId {
        self.id
    }
}

/// Fetches and decodes a template without holding the session.
#[derive(Clone)]
pub struct TemplateLoader {
    store: Arc<dyn TemplateStore>,
    decoder: Arc<dyn ImageDecoder>,
    config: EditorConfig,
}

impl TemplateLoader {
    /// Fetch the record for `id` and rebuild its scene.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id, or
    /// [`CardError::DecodeFailure`] if any image fails to decode.
    pub async fn load(&self, id: TemplateId) -> CardResult<(TemplateRecord, Scene)> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CardError::NotFound(format!("template {id}")))?;
        let scene =
            template::deserialize(&record, self.decoder.as_ref(), self.config.clone()).await?;
        Ok((record, scene))
    }
}

/// One editing session.
pub struct EditorSession {
    scene: Scene,
    tab: EditorTab,
    bound_template: Option<TemplateId>,
    persistence: Persistence,
    decoder: Arc<dyn ImageDecoder>,
    background_input: FileInput,
    pending_images: PendingImages,
    scene_generation: u64,
    background_generation: u64,
    load_generation: u64,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("scene", &self.scene)
            .field("tab", &self.tab)
            .field("bound_template", &self.bound_template)
            .field("persistence", &self.persistence)
            .field("pending_images", &self.pending_images)
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Create a session backed by `store`.
    #[must_use]
    pub fn new(
        config: EditorConfig,
        store: Arc<dyn TemplateStore>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        Self::with_persistence(config, Persistence::Available(store), decoder)
    }

    /// Create a session backed by a file store in `data_dir`.
    ///
    /// If the store cannot be opened the failure is logged once and the
    /// session runs without persistence.
    #[must_use]
    pub fn open(
        config: EditorConfig,
        data_dir: impl Into<std::path::PathBuf>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        let persistence = match FileTemplateStore::open(data_dir) {
            Ok(store) => Persistence::Available(Arc::new(store)),
            Err(e) => Persistence::from(e),
        };
        Self::with_persistence(config, persistence, decoder)
    }

    /// Create a session with an explicit persistence state.
    #[must_use]
    pub fn with_persistence(
        config: EditorConfig,
        persistence: Persistence,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        if let Persistence::Unavailable(reason) = &persistence {
            tracing::error!("Template storage unavailable: {reason}");
        }
        Self {
            scene: Scene::new(config),
            tab: EditorTab::default(),
            bound_template: None,
            persistence,
            decoder,
            background_input: FileInput::default(),
            pending_images: PendingImages::default(),
            scene_generation: 0,
            background_generation: 0,
            load_generation: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The scene being edited.
    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        self.scene.config()
    }

    /// The active property tab.
    #[must_use]
    pub const fn tab(&self) -> EditorTab {
        self.tab
    }

    /// Switch the active property tab.
    pub fn set_tab(&mut self, tab: EditorTab) {
        if self.tab != tab {
            tracing::debug!("Switched to {tab:?} tab");
            self.tab = tab;
        }
    }

    /// Template the session saves into, if any.
    #[must_use]
    pub const fn bound_template(&self) -> Option<TemplateId> {
        self.bound_template
    }

    /// Whether persistence requests can be served.
    #[must_use]
    pub const fn persistence_available(&self) -> bool {
        matches!(self.persistence, Persistence::Available(_))
    }

    /// The background file picker state.
    #[must_use]
    pub const fn background_input(&self) -> &FileInput {
        &self.background_input
    }

    /// The decoder used for imports and loads.
    #[must_use]
    pub fn decoder(&self) -> Arc<dyn ImageDecoder> {
        Arc::clone(&self.decoder)
    }

    /// Whether an image import for `id` is still in flight.
    #[must_use]
    pub fn is_pending(&self, kind: ElementKind, id: ElementId) -> bool {
        kind == ElementKind::Image && self.pending_images.contains(id)
    }

    fn store(&self) -> CardResult<&Arc<dyn TemplateStore>> {
        match &self.persistence {
            Persistence::Available(store) => Ok(store),
            Persistence::Unavailable(reason) => {
                Err(CardError::PersistenceUnavailable(reason.clone()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Route an interaction through the selection chain.
    pub fn interact(&mut self, interaction: Interaction) -> RouteOutcome {
        self.scene.route(self.tab, interaction)
    }

    /// Apply a mutation.
    ///
    /// Stale element ids are skipped with a warning and reported as
    /// [`MutationOutcome::Unchanged`].
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for rejected values.
    pub fn apply(&mut self, mutation: Mutation) -> CardResult<MutationOutcome> {
        match &mutation {
            Mutation::DeleteImage { id } if self.pending_images.cancel(*id) => {
                tracing::debug!("Cancelled pending import of image {id}");
                return Ok(MutationOutcome::Applied);
            }
            Mutation::ClearBackgroundImage => self.background_input.reset(),
            Mutation::SetBackgroundImage(_) => self.background_generation += 1,
            _ => {}
        }

        match self.scene.apply(mutation) {
            Err(CardError::NotFound(what)) => {
                tracing::warn!("Skipping mutation on missing {what}");
                Ok(MutationOutcome::Unchanged)
            }
            other => other,
        }
    }

    /// Reset to an empty card and unbind from any template.
    ///
    /// Every pending import and load is invalidated.
    pub fn new_card(&mut self) {
        let config = self.scene.config().clone();
        self.replace_scene(Scene::new(config));
        self.load_generation += 1;
        self.bound_template = None;
        tracing::info!("Started a new card");
    }

    fn replace_scene(&mut self, scene: Scene) {
        self.scene = scene;
        self.scene_generation += 1;
        self.background_generation += 1;
        self.pending_images.clear();
        self.background_input.reset();
    }

    // -----------------------------------------------------------------------
    // Imports
    // -----------------------------------------------------------------------

    /// Reserve an image element for bytes about to be decoded.
    pub fn begin_image_import(&mut self) -> ImageImportTicket {
        let id = self.scene.next_image_id(current_timestamp_ms());
        self.pending_images.reserve(id, self.scene_generation);
        ImageImportTicket {
            id,
            scene_generation: self.scene_generation,
            pending: self.pending_images.clone(),
        }
    }

    /// Complete an image import.
    ///
    /// Returns the new element id, or `None` if the import went stale.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] if decoding failed; no element
    /// is created.
    pub fn complete_image_import(
        &mut self,
        ticket: ImageImportTicket,
        decoded: CardResult<Bitmap>,
    ) -> CardResult<Option<ElementId>> {
        let id = ticket.id;
        if ticket.scene_generation != self.scene_generation
            || !self.pending_images.release(id, ticket.scene_generation)
        {
            tracing::warn!("Discarding stale import of image {id}");
            return Ok(None);
        }
        let bitmap = decoded?;
        self.scene.insert_image(id, bitmap);
        Ok(Some(id))
    }

    /// Decode `source` and add it as the topmost image.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] for malformed bytes.
    pub async fn import_image(&mut self, source: EncodedImage) -> CardResult<Option<ElementId>> {
        let ticket = self.begin_image_import();
        let decoded = self.decoder.decode(source).await;
        self.complete_image_import(ticket, decoded)
    }

    /// Start a background image import for a file picked by name.
    ///
    /// Returns `None` when the pick repeats the current file.
    pub fn begin_background_import(&mut self, file_name: &str) -> Option<BackgroundImportTicket> {
        if !self.background_input.select(file_name) {
            tracing::debug!("Ignoring repeated pick of {file_name}");
            return None;
        }
        self.background_generation += 1;
        Some(BackgroundImportTicket {
            generation: self.background_generation,
        })
    }

    /// Complete a background import. Returns whether the image was applied.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] if decoding failed; the current
    /// background is kept.
    pub fn complete_background_import(
        &mut self,
        ticket: BackgroundImportTicket,
        decoded: CardResult<Bitmap>,
    ) -> CardResult<bool> {
        if ticket.generation != self.background_generation {
            tracing::warn!("Discarding stale background import");
            return Ok(false);
        }
        match decoded {
            Ok(bitmap) => {
                self.scene.set_background_image(bitmap);
                Ok(true)
            }
            Err(e) => {
                self.background_input.reset();
                Err(e)
            }
        }
    }

    /// Decode `source` and make it the background image.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] for malformed bytes.
    pub async fn import_background(
        &mut self,
        file_name: &str,
        source: EncodedImage,
    ) -> CardResult<bool> {
        let Some(ticket) = self.begin_background_import(file_name) else {
            return Ok(false);
        };
        let decoded = self.decoder.decode(source).await;
        self.complete_background_import(ticket, decoded)
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Save the scene as a template.
    ///
    /// A bound session updates its template in place. Otherwise a new record
    /// is inserted, gated by the template cap; the session stays unbound.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] for a blank name,
    /// [`CardError::PersistenceUnavailable`] without a store, and
    /// [`CardError::LimitExceeded`] when the cap is reached.
    pub async fn save_template(
        &mut self,
        name: &str,
        renderer: Option<&dyn SceneRenderer>,
    ) -> CardResult<TemplateId> {
        let mut record = template::serialize(&self.scene, name, self.bound_template)?;
        let store = Arc::clone(self.store()?);

        if let Some(renderer) = renderer {
            match renderer.thumbnail(&self.scene, self.config().thumbnail_density) {
                Ok(preview) => record = record.with_thumbnail(&preview),
                Err(e) => tracing::warn!("Saving template without thumbnail: {e}"),
            }
        }

        let id = record.id;
        if self.bound_template == Some(id) {
            store.put(record).await?;
            tracing::info!("Updated template {id}");
            return Ok(id);
        }

        let limit = self.config().template_limit;
        if store.count().await? >= limit {
            return Err(CardError::LimitExceeded { limit });
        }
        store.add(record).await?;
        tracing::info!("Saved new template {id}");
        Ok(id)
    }

    /// All saved templates, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::PersistenceUnavailable`] without a store.
    pub async fn list_templates(&self) -> CardResult<Vec<TemplateRecord>> {
        Ok(self.store()?.get_all().await?)
    }

    /// Delete a saved template, unbinding the session if it was bound to it.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id.
    pub async fn delete_template(&mut self, id: TemplateId) -> CardResult<()> {
        if !self.store()?.delete(id).await? {
            return Err(CardError::NotFound(format!("template {id}")));
        }
        if self.bound_template == Some(id) {
            self.bound_template = None;
        }
        tracing::info!("Deleted template {id}");
        Ok(())
    }

    /// Start loading a template, superseding any load in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::PersistenceUnavailable`] without a store.
    pub fn begin_template_load(
        &mut self,
        id: TemplateId,
    ) -> CardResult<(LoadTicket, TemplateLoader)> {
        let loader = TemplateLoader {
            store: Arc::clone(self.store()?),
            decoder: Arc::clone(&self.decoder),
            config: self.scene.config().clone(),
        };
        self.load_generation += 1;
        let ticket = LoadTicket {
            id,
            generation: self.load_generation,
        };
        Ok((ticket, loader))
    }

    /// Finish a template load. On success the scene is replaced and the
    /// session is bound to the template. Returns whether it was applied.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error for a current ticket; the scene is kept.
    pub fn finish_template_load(
        &mut self,
        ticket: LoadTicket,
        loaded: CardResult<(TemplateRecord, Scene)>,
    ) -> CardResult<bool> {
        if ticket.generation != self.load_generation {
            tracing::warn!("Discarding stale load of template {}", ticket.id);
            return Ok(false);
        }
        let (record, scene) = loaded?;
        self.replace_scene(scene);
        self.bound_template = Some(record.id);
        tracing::info!("Loaded template {} ({})", record.id, record.name);
        Ok(true)
    }

    /// Load a template into the session.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::NotFound`] for an unknown id and
    /// [`CardError::DecodeFailure`] if any image fails to decode.
    pub async fn load_template(&mut self, id: TemplateId) -> CardResult<()> {
        let (ticket, loader) = self.begin_template_load(id)?;
        let loaded = loader.load(id).await;
        self.finish_template_load(ticket, loaded).map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Deselect and render the scene to PNG.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Render`] if rendering fails.
    pub fn export_raster(
        &mut self,
        renderer: &dyn SceneRenderer,
        pixel_density: f32,
    ) -> CardResult<EncodedImage> {
        self.scene.deselect();
        renderer.render_raster(&self.scene, pixel_density)
    }

    /// Deselect and render the scene to a single-page PDF.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Render`] if rendering fails.
    pub fn export_pdf(&mut self, renderer: &dyn SceneRenderer) -> CardResult<Vec<u8>> {
        self.scene.deselect();
        renderer.render_pdf(&self.scene)
    }
}

impl From<StoreError> for Persistence {
    fn from(err: StoreError) -> Self {
        Self::Unavailable(err.to_string())
    }
}
