//! # Annotation registry
//!
//! Id-keyed store of annotations and the markers currently rendered for
//! them. Entries never point at each other; everything goes through an
//! [`AnnotationId`] lookup, so removing an annotation is a single map removal.
//!
//! The registry also owns the single interaction-mode slot: at most one
//! annotation is being reselected or extended with a new fragment at a time.

mod target;

use std::collections::HashMap;

use log::{debug, warn};

use crate::anchoring::{
    AnchorError, AnnotationMarkerFactory, Direction, Endpoint, LiveRange,
    PartialAtomicSubtreeWarning, PathSelector, TargetSelector, add_fragment, adjust,
    encode_range, insert, remove, resolve,
};
use crate::profile::DocumentProfile;
use crate::tree::{DocumentTree, text_content};

pub use target::{AnnotationId, FragmentTarget};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown annotation: {0}")]
    UnknownAnnotation(AnnotationId),
    #[error("Duplicate annotation id: {0}")]
    DuplicateAnnotation(AnnotationId),
    #[error("No interaction mode is active")]
    NoActiveMode,
    #[error("Annotation {0} has no PathSelector")]
    MissingPathSelector(AnnotationId),
    #[error("Annotation {id} has no fragment {index}")]
    UnknownFragment { id: AnnotationId, index: usize },
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

/// The single global interaction slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    /// The annotation's target is being replaced; cancelling restores it
    Reselect(AnnotationId),
    /// The next committed range becomes a new fragment of the annotation
    AddFragment(AnnotationId),
}

/// Outcome of a batch [`AnnotationRegistry::load`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<AnnotationId>,
    pub failed: Vec<(AnnotationId, RegistryError)>,
    pub warnings: Vec<(AnnotationId, PartialAtomicSubtreeWarning)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
struct Entry<N> {
    target: FragmentTarget,
    /// Markers per fragment, parallel to the target's fragments
    markers: Vec<Vec<N>>,
}

struct Rendered<N> {
    markers: Vec<Vec<N>>,
    warnings: Vec<PartialAtomicSubtreeWarning>,
}

/// Annotations rendered into one document tree.
#[derive(Debug)]
pub struct AnnotationRegistry<N> {
    profile: DocumentProfile,
    entries: HashMap<AnnotationId, Entry<N>>,
    order: Vec<AnnotationId>,
    mode: InteractionMode,
    /// Target to restore when a reselect is cancelled
    committed: Option<TargetSelector>,
}

impl<N: Copy + Eq + std::hash::Hash + std::fmt::Debug> AnnotationRegistry<N> {
    pub fn new(profile: DocumentProfile) -> Self {
        Self {
            profile,
            entries: HashMap::new(),
            order: Vec::new(),
            mode: InteractionMode::Idle,
            committed: None,
        }
    }

    pub fn profile(&self) -> &DocumentProfile {
        &self.profile
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&FragmentTarget> {
        self.entries.get(id).map(|entry| &entry.target)
    }

    /// Targets in the order they were added.
    pub fn targets(&self) -> impl Iterator<Item = &FragmentTarget> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| &entry.target))
    }

    /// All markers currently rendered for `id`, in fragment order.
    pub fn markers(&self, id: &AnnotationId) -> Option<Vec<N>> {
        self.entries
            .get(id)
            .map(|entry| entry.markers.iter().flatten().copied().collect())
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    /// Encode `range` and render it as a new annotation.
    pub fn create<T>(
        &mut self,
        tree: &mut T,
        source: &str,
        range: &LiveRange<N>,
    ) -> Result<AnnotationId, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let selector = encode_range(tree, &self.profile, range)?;
        let id = AnnotationId::generate();
        self.add(tree, FragmentTarget::new(id.clone(), source, selector.into()))?;
        Ok(id)
    }

    /// Render a persisted target and register it.
    pub fn add<T>(
        &mut self,
        tree: &mut T,
        target: FragmentTarget,
    ) -> Result<Vec<PartialAtomicSubtreeWarning>, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        if self.entries.contains_key(&target.id) {
            return Err(RegistryError::DuplicateAnnotation(target.id));
        }
        let selector = target
            .path_selector()
            .ok_or_else(|| RegistryError::MissingPathSelector(target.id.clone()))?;
        let rendered = self.render(tree, &target.id, selector)?;

        debug!("registered annotation {}", target.id);
        self.order.push(target.id.clone());
        self.entries.insert(
            target.id.clone(),
            Entry {
                target,
                markers: rendered.markers,
            },
        );
        Ok(rendered.warnings)
    }

    /// Render a batch; each target succeeds or fails on its own.
    pub fn load<T>(&mut self, tree: &mut T, targets: Vec<FragmentTarget>) -> LoadReport
    where
        T: DocumentTree<Node = N>,
    {
        let mut report = LoadReport::default();
        for target in targets {
            let id = target.id.clone();
            match self.add(tree, target) {
                Ok(warnings) => {
                    report
                        .warnings
                        .extend(warnings.into_iter().map(|warning| (id.clone(), warning)));
                    report.loaded.push(id);
                }
                Err(error) => {
                    warn!("skipping annotation {id}: {error}");
                    report.failed.push((id, error));
                }
            }
        }
        report
    }

    /// Unrender and forget an annotation.
    pub fn remove<T>(&mut self, tree: &mut T, id: &AnnotationId) -> Result<FragmentTarget, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))?;
        for markers in &entry.markers {
            remove(tree, markers);
        }
        self.order.retain(|other| other != id);
        if self.mode_target() == Some(id) {
            self.mode = InteractionMode::Idle;
            self.committed = None;
        }
        debug!("removed annotation {id}");
        Ok(entry.target)
    }

    /// Text currently covered by the annotation's markers; fragments are
    /// separated by a single space.
    pub fn quote<T>(&self, tree: &T, id: &AnnotationId) -> Result<String, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))?;
        let fragments: Vec<String> = entry
            .markers
            .iter()
            .map(|markers| {
                markers
                    .iter()
                    .map(|&marker| text_content(tree, marker))
                    .collect::<String>()
            })
            .collect();
        Ok(fragments.join(" "))
    }

    /// Move one endpoint of fragment `fragment` by one step.
    pub fn adjust<T>(
        &mut self,
        tree: &mut T,
        id: &AnnotationId,
        fragment: usize,
        endpoint: Endpoint,
        direction: Direction,
    ) -> Result<PathSelector, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let profile = &self.profile;
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))?;
        let target = entry
            .target
            .path_selector()
            .ok_or_else(|| RegistryError::MissingPathSelector(id.clone()))?
            .clone();
        let unknown_fragment = || RegistryError::UnknownFragment {
            id: id.clone(),
            index: fragment,
        };
        let current = target.fragments().get(fragment).ok_or_else(unknown_fragment)?;
        let markers = entry.markers.get(fragment).ok_or_else(unknown_fragment)?;

        let mut factory = AnnotationMarkerFactory::new(profile, id.as_str());
        let adjusted = match adjust(tree, profile, current, markers, endpoint, direction, &mut factory) {
            Ok(adjusted) => adjusted,
            Err(error) => {
                // The old markers are already detached; redraw the fragment if it still resolves.
                warn!("could not adjust {id}: {error}");
                entry.markers[fragment] = match resolve(tree, profile, current) {
                    Ok(range) => insert(tree, profile, &range, &mut factory).markers,
                    Err(_) => Vec::new(),
                };
                return Err(error.into());
            }
        };

        let updated = target
            .with_fragment(fragment, adjusted.selector.clone())
            .ok_or_else(unknown_fragment)?;
        entry.target = entry.target.with_path_selector(updated);
        entry.markers[fragment] = adjusted.insertion.markers;
        Ok(adjusted.selector)
    }

    /// Enter reselect mode for `id`, or leave it when it is already active.
    pub fn start_reselect<T>(&mut self, tree: &mut T, id: &AnnotationId) -> Result<(), RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        if self.mode == InteractionMode::Reselect(id.clone()) {
            return self.cancel(tree);
        }
        let committed = self
            .get(id)
            .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))?
            .path_selector()
            .cloned()
            .ok_or_else(|| RegistryError::MissingPathSelector(id.clone()))?;
        self.cancel_active(tree)?;
        self.committed = Some(committed);
        self.mode = InteractionMode::Reselect(id.clone());
        Ok(())
    }

    /// Enter add-fragment mode for `id`, or leave it when it is already active.
    pub fn start_add_fragment<T>(&mut self, tree: &mut T, id: &AnnotationId) -> Result<(), RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        if self.mode == InteractionMode::AddFragment(id.clone()) {
            return self.cancel(tree);
        }
        if !self.entries.contains_key(id) {
            return Err(RegistryError::UnknownAnnotation(id.clone()));
        }
        self.cancel_active(tree)?;
        self.mode = InteractionMode::AddFragment(id.clone());
        Ok(())
    }

    /// Leave the active mode. A reselect restores the committed target.
    pub fn cancel<T>(&mut self, tree: &mut T) -> Result<(), RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        match std::mem::take(&mut self.mode) {
            InteractionMode::Idle => Err(RegistryError::NoActiveMode),
            InteractionMode::AddFragment(id) => {
                debug!("cancelled add-fragment for {id}");
                Ok(())
            }
            InteractionMode::Reselect(id) => {
                debug!("cancelled reselect for {id}");
                match self.committed.take() {
                    Some(committed) => self.replace_target(tree, &id, committed),
                    None => Ok(()),
                }
            }
        }
    }

    /// Apply `range` to the active mode and leave it.
    ///
    /// Reselect replaces the target with `range`; add-fragment appends it.
    pub fn commit_range<T>(&mut self, tree: &mut T, range: &LiveRange<N>) -> Result<AnnotationId, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let fragment = encode_range(tree, &self.profile, range)?;
        let (id, updated) = match &self.mode {
            InteractionMode::Idle => return Err(RegistryError::NoActiveMode),
            InteractionMode::Reselect(id) => (id.clone(), TargetSelector::Path(fragment)),
            InteractionMode::AddFragment(id) => {
                let current = self.get(id).and_then(FragmentTarget::path_selector).cloned();
                (id.clone(), add_fragment(current, fragment))
            }
        };
        self.replace_target(tree, &id, updated)?;
        self.mode = InteractionMode::Idle;
        self.committed = None;
        Ok(id)
    }

    /// Keep the current target (including adjustments) and leave the active mode.
    pub fn commit(&mut self) -> Result<AnnotationId, RegistryError> {
        let id = match std::mem::take(&mut self.mode) {
            InteractionMode::Idle => return Err(RegistryError::NoActiveMode),
            InteractionMode::Reselect(id) | InteractionMode::AddFragment(id) => id,
        };
        self.committed = None;
        Ok(id)
    }

    fn mode_target(&self) -> Option<&AnnotationId> {
        match &self.mode {
            InteractionMode::Idle => None,
            InteractionMode::Reselect(id) | InteractionMode::AddFragment(id) => Some(id),
        }
    }

    fn cancel_active<T>(&mut self, tree: &mut T) -> Result<(), RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        if self.mode == InteractionMode::Idle {
            return Ok(());
        }
        self.cancel(tree)
    }

    /// Swap an annotation's path target, re-rendering it. On failure the
    /// previous target is rendered again.
    fn replace_target<T>(
        &mut self,
        tree: &mut T,
        id: &AnnotationId,
        selector: TargetSelector,
    ) -> Result<(), RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let previous = {
            let entry = self
                .entries
                .get(id)
                .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))?;
            for markers in &entry.markers {
                remove(tree, markers);
            }
            entry.target.path_selector().cloned()
        };

        match self.render(tree, id, &selector) {
            Ok(rendered) => {
                let entry = self.entry_mut(id)?;
                entry.target = entry.target.with_path_selector(selector);
                entry.markers = rendered.markers;
                Ok(())
            }
            Err(error) => {
                warn!("could not render new target for {id}: {error}");
                let restored = match previous {
                    Some(previous) => self
                        .render(tree, id, &previous)
                        .map(|rendered| rendered.markers)
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                self.entry_mut(id)?.markers = restored;
                Err(error)
            }
        }
    }

    fn entry_mut(&mut self, id: &AnnotationId) -> Result<&mut Entry<N>, RegistryError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownAnnotation(id.clone()))
    }

    /// Resolve and insert every fragment; nothing stays inserted on failure.
    fn render<T>(
        &self,
        tree: &mut T,
        id: &AnnotationId,
        selector: &TargetSelector,
    ) -> Result<Rendered<N>, RegistryError>
    where
        T: DocumentTree<Node = N>,
    {
        let mut factory = AnnotationMarkerFactory::new(&self.profile, id.as_str());
        let mut rendered = Rendered {
            markers: Vec::new(),
            warnings: Vec::new(),
        };
        for fragment in selector.fragments() {
            let range = match resolve(tree, &self.profile, fragment) {
                Ok(range) => range,
                Err(error) => {
                    for markers in &rendered.markers {
                        remove(tree, markers);
                    }
                    return Err(error.into());
                }
            };
            let insertion = insert(tree, &self.profile, &range, &mut factory);
            rendered.markers.push(insertion.markers);
            rendered.warnings.extend(insertion.warnings);
        }
        Ok(rendered)
    }
}
