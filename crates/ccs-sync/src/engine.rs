//! Grab and put orchestration.
//!
//! Every operation works in phases: kinds without a parent first, then the
//! kinds nested under them, and so on. A phase starts only after the
//! previous one has fully resolved. Within a phase artifacts fan out over a
//! bounded batch, and one artifact's failure never cancels its siblings.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use ccs_client::{ClientResult, InvokeArgs, Invoker, LocaleNegotiator};
use ccs_protocol::RequestSpec;
use ccs_types::{dir_safe, ArtifactKind, Locale, VersionedArtifact};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::batch::run_batch;
use crate::cache::{CacheBuilder, FrozenCache};
use crate::config::SyncConfig;
use crate::dedup::dedupe_latest;
use crate::delete::{prune_empty_dirs, remove_file, snapshot_files};
use crate::error::{SyncError, SyncResult};
use crate::etag::EtagStore;
use crate::layout::{artifact_dir, file_path, ArtifactFile, ArtifactLayout, LayoutSet};
use crate::metadata::{Classified, JsonMetadataStore, LayoutClassifier, MetadataStore, PathClassifier, Scaffolder};
use crate::node::{check_origin, record_origin, OriginStatus};
use crate::state::{GrabState, PutState, SyncReport};

/// Remote id of an artifact to its root-relative directory.
type PlacedDirs = FrozenCache<String, PathBuf>;

struct Fetched {
    body: Value,
    etag: Option<String>,
}

enum Upload {
    Done,
    NotFound,
    NotUploadable,
}

pub struct SyncEngine {
    invoker: Arc<Invoker>,
    config: SyncConfig,
    layouts: LayoutSet,
    metadata: Arc<dyn MetadataStore>,
    classifier: Arc<dyn PathClassifier>,
    scaffolder: Option<Arc<dyn Scaffolder>>,
    etags: EtagStore,
    transfer_mode: bool,
}

impl SyncEngine {
    /// Transfer mode is on if either the sync config or the invoker's
    /// request environment asks for it.
    pub fn new(invoker: Arc<Invoker>, config: SyncConfig, layouts: LayoutSet) -> Self {
        let transfer_mode = config.transfer_mode || invoker.transfer_mode();
        Self {
            metadata: Arc::new(JsonMetadataStore::new(&config.root)),
            classifier: Arc::new(LayoutClassifier::new(layouts.clone())),
            scaffolder: None,
            etags: EtagStore::new(&config.root, invoker.instance(), transfer_mode),
            transfer_mode,
            invoker,
            config,
            layouts,
        }
    }

    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = store;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PathClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_scaffolder(mut self, scaffolder: Arc<dyn Scaffolder>) -> Self {
        self.scaffolder = Some(scaffolder);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn layouts(&self) -> &LayoutSet {
        &self.layouts
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn transfer_mode(&self) -> bool {
        self.transfer_mode
    }

    pub fn check_origin(&self) -> SyncResult<OriginStatus> {
        check_origin(&self.config.root, self.invoker.instance(), self.transfer_mode)
    }

    /// Root-relative form of `path`. Relative paths are taken as relative to
    /// the mirror root already.
    pub fn relative(&self, path: &Path) -> SyncResult<PathBuf> {
        let outside = || SyncError::OutsideRoot { path: path.to_path_buf() };
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.config.root).map_err(|_| outside())?.to_path_buf()
        } else {
            path.to_path_buf()
        };
        let mut clean = PathBuf::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                _ => return Err(outside()),
            }
        }
        Ok(clean)
    }

    fn working_locales(&self) -> Vec<Locale> {
        self.invoker.locales().map(|s| s.working.clone()).unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Grab
    // ---------------------------------------------------------------

    /// Mirror every configured kind.
    pub async fn grab_all(&self) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let mut report = SyncReport::new();
        let mut placed: HashMap<ArtifactKind, PlacedDirs> = HashMap::new();

        for (depth, phase) in self.layouts.phases()?.into_iter().enumerate() {
            debug!(depth, kinds = phase.len(), "grab phase");
            for layout in phase {
                let parents = self.parents_from(&placed, layout.as_ref());
                match self.grab_layout(layout.as_ref(), &parents).await {
                    Ok((r, dirs)) => {
                        report.merge(r);
                        placed.insert(layout.kind().clone(), dirs);
                    }
                    Err(e) => {
                        warn!(kind = %layout.kind(), error = %e, "could not grab kind");
                        report.fail(layout.kind().to_string(), e);
                    }
                }
            }
        }

        record_origin(&self.config.root, self.invoker.instance())?;
        info!(%report, "grab finished");
        Ok(report)
    }

    /// Mirror one kind. Ancestor kinds are listed, not downloaded, to place
    /// its artifacts.
    pub async fn grab_kind(&self, kind: &ArtifactKind) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let layout = Arc::clone(self.layouts.require(kind)?);
        let parents = self.ancestor_dirs(layout.as_ref()).await?;
        let (report, _) = self.grab_layout(layout.as_ref(), &parents).await?;
        record_origin(&self.config.root, self.invoker.instance())?;
        info!(%kind, %report, "grab finished");
        Ok(report)
    }

    /// Mirror whatever `path` names: the whole root, a kind directory, an
    /// artifact directory, or one file (which refreshes its artifact).
    pub async fn grab_path(&self, path: &Path) -> SyncResult<SyncReport> {
        let rel = self.relative(path)?;
        if rel.as_os_str().is_empty() {
            return self.grab_all().await;
        }
        if let Some(c) = self.classifier.classify(&rel) {
            return self.grab_one(&c.kind, &c.artifact_dir).await;
        }
        if let Some(meta) = self.metadata.read(&rel)? {
            return self.grab_one(&meta.kind, &rel).await;
        }
        let top_level = self
            .layouts
            .iter()
            .find(|l| l.parent_kind().is_none() && Path::new(l.directory()) == rel)
            .map(|l| l.kind().clone());
        match top_level {
            Some(kind) => self.grab_kind(&kind).await,
            None => Err(SyncError::Unclassified { path: rel }),
        }
    }

    async fn grab_one(&self, kind: &ArtifactKind, dir: &Path) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let layout = Arc::clone(self.layouts.require(kind)?);
        let parents = self.ancestor_dirs(layout.as_ref()).await?;
        let mut report = SyncReport::new();
        let item = dir.display().to_string();

        if !self.invoker.probe(kind.as_str(), &layout.grab_operations()) {
            return Ok(report);
        }
        let placed = self.place_listed(layout.as_ref(), &parents).await?;
        match placed.into_iter().find(|(_, d)| d == dir) {
            Some((artifact, dir)) => {
                let state = self.grab_artifact(layout.as_ref(), &artifact, &dir).await;
                report.record_grab(item, state);
            }
            None => {
                warn!(path = %item, "no remote artifact for this directory");
                report.record_grab(item, GrabState::SkippedNotFound);
            }
        }
        record_origin(&self.config.root, self.invoker.instance())?;
        Ok(report)
    }

    fn parents_from(&self, placed: &HashMap<ArtifactKind, PlacedDirs>, layout: &dyn ArtifactLayout) -> PlacedDirs {
        layout
            .parent_kind()
            .and_then(|p| placed.get(p).cloned())
            .unwrap_or_else(FrozenCache::empty)
    }

    /// Directories of the parent kind's artifacts, found by listing every
    /// ancestor from the outermost down.
    async fn ancestor_dirs(&self, layout: &dyn ArtifactLayout) -> SyncResult<PlacedDirs> {
        let lineage = self.layouts.lineage(layout.kind())?;
        let mut parents = FrozenCache::empty();
        for ancestor in &lineage[..lineage.len() - 1] {
            let placed = self.place_listed(ancestor.as_ref(), &parents).await?;
            parents = freeze_dirs(&placed);
        }
        Ok(parents)
    }

    /// List, dedupe and place one kind's remote artifacts.
    ///
    /// Children whose parent is not mirrored are dropped.
    async fn place_listed(
        &self,
        layout: &dyn ArtifactLayout,
        parents: &PlacedDirs,
    ) -> SyncResult<Vec<(VersionedArtifact, PathBuf)>> {
        if !self.invoker.probe(layout.kind().as_str(), &[layout.list_operation()]) {
            return Ok(Vec::new());
        }
        let listed = match self.invoker.invoke_json(layout.list_operation(), InvokeArgs::new()).await? {
            Some(body) => layout.parse_listing(&body)?,
            None => Vec::new(),
        };
        let total = listed.len();
        let current = dedupe_latest(listed);
        debug!(kind = %layout.kind(), total, current = current.len(), "listed");

        let mut placed = Vec::with_capacity(current.len());
        let mut taken: HashSet<PathBuf> = HashSet::new();
        for artifact in current {
            let parent_dir = match (layout.parent_kind(), &artifact.parent_id) {
                (None, _) => None,
                (Some(_), Some(parent)) => match parents.get(parent) {
                    Some(dir) => Some(dir.as_path()),
                    None => {
                        debug!(kind = %layout.kind(), name = %artifact.display_name, %parent, "parent not mirrored");
                        continue;
                    }
                },
                (Some(_), None) => {
                    debug!(kind = %layout.kind(), name = %artifact.display_name, "listing entry without parent");
                    continue;
                }
            };
            let mut dir = artifact_dir(layout, &artifact, parent_dir);
            if taken.contains(&dir) {
                let unique = dir.with_file_name(format!("{}~{}", artifact.dir_name(), dir_safe(&artifact.remote_id)));
                if taken.contains(&unique) {
                    warn!(kind = %layout.kind(), name = %artifact.display_name, "directory already taken, skipping");
                    continue;
                }
                warn!(
                    kind = %layout.kind(),
                    name = %artifact.display_name,
                    path = %unique.display(),
                    "directory name collides with another artifact"
                );
                dir = unique;
            }
            taken.insert(dir.clone());
            placed.push((artifact, dir));
        }
        Ok(placed)
    }

    async fn grab_layout(
        &self,
        layout: &dyn ArtifactLayout,
        parents: &PlacedDirs,
    ) -> SyncResult<(SyncReport, PlacedDirs)> {
        if !self.invoker.probe(layout.kind().as_str(), &layout.grab_operations()) {
            return Ok((SyncReport::new(), FrozenCache::empty()));
        }
        let placed = self.place_listed(layout, parents).await?;
        let dirs = freeze_dirs(&placed);
        info!(kind = %layout.kind(), count = placed.len(), "grabbing");

        let outcomes = run_batch(placed, self.config.grab_concurrency, |(artifact, dir)| async move {
            let state = self.grab_artifact(layout, &artifact, &dir).await;
            (dir, state)
        })
        .await;

        let mut report = SyncReport::new();
        for (dir, state) in outcomes {
            report.record_grab(dir.display().to_string(), state);
        }
        Ok((report, dirs))
    }

    async fn grab_artifact(&self, layout: &dyn ArtifactLayout, artifact: &VersionedArtifact, dir: &Path) -> GrabState {
        match self.try_grab_artifact(layout, artifact, dir).await {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "grab failed");
                GrabState::Failed(e.to_string())
            }
        }
    }

    async fn try_grab_artifact(
        &self,
        layout: &dyn ArtifactLayout,
        artifact: &VersionedArtifact,
        dir: &Path,
    ) -> SyncResult<GrabState> {
        if layout.versioned() {
            if let Some(local) = self.metadata.read(dir)? {
                if local.version >= artifact.version {
                    debug!(path = %dir.display(), local = local.version, remote = artifact.version, "already current");
                    return Ok(GrabState::SkippedCurrent);
                }
            }
        }

        debug!(path = %dir.display(), state = ?GrabState::Fetching, "grabbing artifact");
        let locales = if layout.per_locale() { self.working_locales() } else { Vec::new() };
        let mut found = false;
        for file in layout.files() {
            if locales.is_empty() {
                found |= self.grab_file(artifact, dir, file, None).await?;
            } else {
                for locale in &locales {
                    found |= self.grab_file(artifact, dir, file, Some(locale)).await?;
                }
            }
        }

        if !found {
            debug!(path = %dir.display(), "not found on server");
            return Ok(GrabState::SkippedNotFound);
        }
        self.metadata.write(dir, artifact)?;
        Ok(GrabState::Written)
    }

    async fn grab_file(
        &self,
        artifact: &VersionedArtifact,
        dir: &Path,
        file: &ArtifactFile,
        locale: Option<&Locale>,
    ) -> SyncResult<bool> {
        let fetched = match locale {
            Some(locale) => LocaleNegotiator::fetch_with_fallback(locale, |candidate| {
                self.fetch_file(artifact, file, Some(candidate))
            })
            .await?
            .map(|(_, fetched)| fetched),
            None => self.fetch_file(artifact, file, None).await?,
        };
        let Some(fetched) = fetched else {
            return Ok(false);
        };
        let Some(content) = file.extract(&fetched.body)? else {
            return Ok(false);
        };

        let rel = file_path(dir, file, locale.map(|l| l.name.as_str()));
        write_if_changed(&self.config.root.join(&rel), &content)?;
        if let Some(etag) = &fetched.etag {
            self.etags.write(&rel, etag)?;
        }
        Ok(true)
    }

    /// One get call; `None` if the server has no such artifact or no content
    /// for this file.
    async fn fetch_file(
        &self,
        artifact: &VersionedArtifact,
        file: &ArtifactFile,
        locale: Option<String>,
    ) -> ClientResult<Option<Fetched>> {
        let mut spec = RequestSpec::new().ignore_status(404);
        if let Some(locale) = locale {
            spec = spec.locale(locale);
        }
        let args = InvokeArgs::new().path([artifact.remote_id.as_str()]).spec(spec);
        let response = self.invoker.invoke(&file.get_operation, args).await?;
        if response.ignored {
            return Ok(None);
        }
        let etag = response.etag().map(str::to_string);
        let body = response
            .json_value()?
            .filter(|body| body.get(&file.field).is_some_and(|v| !v.is_null()));
        Ok(body.map(|body| Fetched { body, etag }))
    }

    // ---------------------------------------------------------------
    // Put
    // ---------------------------------------------------------------

    /// Upload the given files and directories.
    pub async fn put_paths(&self, paths: &[PathBuf]) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let mut report = SyncReport::new();
        let mut files = Vec::new();
        for path in paths {
            let rel = self.relative(path)?;
            let abs = self.config.root.join(&rel);
            if abs.is_dir() {
                files.extend(snapshot_files(&self.config.root, &rel)?);
            } else if abs.is_file() {
                files.push(rel);
            } else {
                report.fail(rel.display().to_string(), "no such file or directory");
            }
        }
        report.merge(self.put_files(files).await?);
        Ok(report)
    }

    /// Upload everything under the mirror root.
    pub async fn put_all(&self) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let files = snapshot_files(&self.config.root, Path::new(""))?;
        self.put_files(files).await
    }

    async fn put_files(&self, files: Vec<PathBuf>) -> SyncResult<SyncReport> {
        // Files of one artifact go up together, in order, so a missing
        // artifact is created once.
        let mut groups: BTreeMap<PathBuf, (ArtifactKind, Vec<Classified>)> = BTreeMap::new();
        for rel in files {
            match self.classifier.classify(&rel) {
                Some(c) => groups
                    .entry(c.artifact_dir.clone())
                    .or_insert_with(|| (c.kind.clone(), Vec::new()))
                    .1
                    .push(c),
                None => debug!(path = %rel.display(), "not an artifact file, ignoring"),
            }
        }

        let mut phases: Vec<Vec<(PathBuf, Arc<dyn ArtifactLayout>, Vec<Classified>)>> = Vec::new();
        for (dir, (kind, files)) in groups {
            let depth = self.layouts.lineage(&kind)?.len() - 1;
            let layout = Arc::clone(self.layouts.require(&kind)?);
            if phases.len() <= depth {
                phases.resize_with(depth + 1, Vec::new);
            }
            phases[depth].push((dir, layout, files));
        }

        let mut report = SyncReport::new();
        for phase in phases {
            let outcomes = run_batch(phase, self.config.put_concurrency, |(dir, layout, files)| async move {
                self.put_artifact(layout.as_ref(), &dir, files).await
            })
            .await;
            for (item, state) in outcomes.into_iter().flatten() {
                report.record_put(item, state);
            }
        }
        info!(%report, "put finished");
        Ok(report)
    }

    async fn put_artifact(
        &self,
        layout: &dyn ArtifactLayout,
        dir: &Path,
        files: Vec<Classified>,
    ) -> Vec<(String, PutState)> {
        let items: Vec<String> = files
            .iter()
            .map(|c| {
                layout
                    .file(&c.file)
                    .map(|f| file_path(&c.artifact_dir, f, c.locale.as_deref()))
                    .unwrap_or_else(|| c.artifact_dir.join(&c.file))
                    .display()
                    .to_string()
            })
            .collect();
        let all = |state: PutState| items.iter().map(|i| (i.clone(), state.clone())).collect::<Vec<_>>();

        let local = match self.metadata.read(dir) {
            Ok(local) => local,
            Err(e) => return all(PutState::Failed(e.to_string())),
        };
        let (mut artifact, mut created) = match local {
            Some(artifact) => (artifact, false),
            None if self.transfer_mode => match self.create_artifact(layout, dir, None).await {
                Ok(Some(artifact)) => (artifact, true),
                Ok(None) => return all(PutState::SkippedNoMetadata),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "create failed");
                    return all(PutState::Failed(e.to_string()));
                }
            },
            None => {
                warn!(path = %dir.display(), "no server metadata for this artifact, skipping");
                return all(PutState::SkippedNoMetadata);
            }
        };
        debug!(path = %dir.display(), state = ?PutState::MetadataResolved, remote_id = %artifact.remote_id, "metadata resolved");

        let mut out = Vec::with_capacity(files.len());
        for (c, item) in files.iter().zip(items.iter()) {
            let mut result = self.upload(layout, &artifact, c).await;
            if matches!(result, Ok(Upload::NotFound)) && !created {
                info!(path = %dir.display(), "not on this server, creating");
                match self.create_artifact(layout, dir, Some(&artifact)).await {
                    Ok(Some(fresh)) => {
                        artifact = fresh;
                        created = true;
                        result = self.upload(layout, &artifact, c).await;
                    }
                    Ok(None) => {}
                    Err(e) => result = Err(e),
                }
            }
            let state = match result {
                Ok(Upload::Done) if created => PutState::Created,
                Ok(Upload::Done) => PutState::Updated,
                Ok(Upload::NotUploadable) => continue,
                Ok(Upload::NotFound) => PutState::Failed("not found on server".into()),
                Err(e) => {
                    warn!(path = %item, error = %e, "put failed");
                    PutState::Failed(e.to_string())
                }
            };
            out.push((item.clone(), state));
        }
        out
    }

    /// Send one file. A 404 is reported as `NotFound` only in transfer mode;
    /// otherwise it is an error like any other status.
    async fn upload(&self, layout: &dyn ArtifactLayout, artifact: &VersionedArtifact, c: &Classified) -> SyncResult<Upload> {
        let Some(file) = layout.file(&c.file) else {
            return Ok(Upload::NotUploadable);
        };
        let Some(operation) = file.put_operation.as_deref() else {
            debug!(file = %file.name, "no upload operation, skipping");
            return Ok(Upload::NotUploadable);
        };
        if !self.invoker.probe(layout.kind().as_str(), &[operation]) {
            return Ok(Upload::NotUploadable);
        }

        let rel = file_path(&c.artifact_dir, file, c.locale.as_deref());
        let mut spec = RequestSpec::new()
            .body_from_file(self.config.root.join(&rel))
            .field(file.field.clone())
            .etag(self.etags.read(&rel)?);
        if file.json {
            spec = spec.as_json();
        }
        if let Some(locale) = &c.locale {
            spec = spec.locale(locale.clone());
        }
        if self.transfer_mode {
            spec = spec.ignore_status(404);
        }

        let args = InvokeArgs::new().path([artifact.remote_id.as_str()]).spec(spec);
        let response = self.invoker.invoke(operation, args).await?;
        if response.ignored {
            return Ok(Upload::NotFound);
        }
        if let Some(etag) = response.etag() {
            self.etags.write(&rel, etag)?;
        }
        debug!(path = %rel.display(), "uploaded");
        Ok(Upload::Done)
    }

    /// Create the artifact living in `dir` on the target server and record
    /// the new identity. `None` if the kind cannot be created remotely.
    async fn create_artifact(
        &self,
        layout: &dyn ArtifactLayout,
        dir: &Path,
        known: Option<&VersionedArtifact>,
    ) -> SyncResult<Option<VersionedArtifact>> {
        let Some(operation) = layout.create_operation() else {
            warn!(kind = %layout.kind(), path = %dir.display(), "kind cannot be created on the server, skipping");
            return Ok(None);
        };
        if !self.invoker.probe(layout.kind().as_str(), &[operation]) {
            return Ok(None);
        }

        let display_name = match known {
            Some(artifact) => artifact.display_name.clone(),
            None => dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let parent_id = match layout.parent_kind() {
            // <parent dir>/<kind dir>/<name>
            Some(_) => match dir.parent().and_then(Path::parent) {
                Some(parent_dir) => self.metadata.read(parent_dir)?.map(|p| p.remote_id),
                None => None,
            },
            None => None,
        };

        let mut body = layout.create_body(&display_name, parent_id.as_deref());
        if let Some(scaffolder) = &self.scaffolder {
            let extra = scaffolder.render(layout.kind(), &display_name, &self.config.root.join(dir))?;
            merge_object(&mut body, extra);
        }

        let response = self
            .invoker
            .invoke_json(operation, InvokeArgs::new().spec(RequestSpec::new().json(body)))
            .await?;
        let created = response
            .and_then(|body| layout.parse_created(&body, &display_name))
            .ok_or_else(|| SyncError::InvalidListing {
                operation: operation.to_string(),
                reason: "create response carries no id".into(),
            })?;
        self.metadata.write(dir, &created)?;
        info!(kind = %layout.kind(), name = %display_name, remote_id = %created.remote_id, "created");
        Ok(Some(created))
    }

    // ---------------------------------------------------------------
    // Delete
    // ---------------------------------------------------------------

    /// Delete a directory's artifacts remotely and its files locally.
    ///
    /// Files are snapshotted first and remote deletes run over the artifacts
    /// in that snapshot. An artifact whose remote delete fails keeps its
    /// files, etags and metadata, along with everything nested under it.
    /// Empty directories are pruned last.
    pub async fn delete_tree(&self, path: &Path) -> SyncResult<SyncReport> {
        self.check_origin()?;
        let rel = self.relative(path)?;
        let files = snapshot_files(&self.config.root, &rel)?;

        let mut artifacts: BTreeMap<PathBuf, ArtifactKind> = BTreeMap::new();
        for file in &files {
            if let Some(c) = self.classifier.classify(file) {
                artifacts.entry(c.artifact_dir).or_insert(c.kind);
            }
        }

        let outcomes = run_batch(artifacts, self.config.put_concurrency, |(dir, kind)| async move {
            let result = self.delete_remote(&kind, &dir).await;
            (dir, result)
        })
        .await;

        let mut report = SyncReport::new();
        let mut kept: Vec<PathBuf> = Vec::new();
        let mut cleared: Vec<PathBuf> = Vec::new();
        for (dir, result) in outcomes {
            match result {
                Ok(deleted) => {
                    if deleted {
                        report.deleted += 1;
                    }
                    cleared.push(dir);
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "remote delete failed, keeping local copy");
                    report.fail(dir.display().to_string(), e);
                    kept.push(dir);
                }
            }
        }
        let is_kept = |path: &Path| kept.iter().any(|k| path.starts_with(k));

        for dir in cleared.iter().filter(|d| !is_kept(d.as_path())) {
            self.metadata.remove(dir)?;
        }
        for file in files.iter().filter(|f| !is_kept(f.as_path())) {
            remove_file(&self.config.root.join(file))?;
            self.etags.remove(file)?;
        }
        prune_empty_dirs(&self.config.root.join(&rel), &self.config.root)?;
        info!(path = %rel.display(), %report, "delete finished");
        Ok(report)
    }

    /// `true` if a remote delete was issued.
    async fn delete_remote(&self, kind: &ArtifactKind, dir: &Path) -> SyncResult<bool> {
        let layout = self.layouts.require(kind)?;
        let Some(artifact) = self.metadata.read(dir)? else {
            debug!(path = %dir.display(), "untracked, removing locally only");
            return Ok(false);
        };
        let Some(operation) = layout.delete_operation() else {
            debug!(kind = %kind, "no delete operation, removing locally only");
            return Ok(false);
        };
        if !self.invoker.probe(kind.as_str(), &[operation]) {
            return Ok(false);
        }
        let args = InvokeArgs::new()
            .path([artifact.remote_id.as_str()])
            .spec(RequestSpec::new().ignore_status(404));
        self.invoker.invoke(operation, args).await?;
        debug!(path = %dir.display(), remote_id = %artifact.remote_id, "deleted remotely");
        Ok(true)
    }
}

fn freeze_dirs(placed: &[(VersionedArtifact, PathBuf)]) -> PlacedDirs {
    let mut cache = CacheBuilder::new();
    cache.extend(placed.iter().map(|(a, d)| (a.remote_id.clone(), d.clone())));
    cache.freeze()
}

fn merge_object(target: &mut Value, extra: Value) {
    match (target, extra) {
        (Value::Object(target), Value::Object(extra)) => target.extend(extra),
        (_, Value::Null) => {}
        (target, extra) => *target = extra,
    }
}

/// Write `content` unless the file already holds exactly that.
fn write_if_changed(path: &Path, content: &[u8]) -> SyncResult<bool> {
    if fs::read(path).is_ok_and(|existing| existing == content) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| SyncError::io(path, e))?;
    Ok(true)
}
