// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler selection and memoization

use super::{BackendDescriptor, CompileFn, CompilerDescriptor};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// One detection generation; replaced wholesale by `clear`
struct DetectState {
    active: OnceCell<CompileFn>,
    /// `None` once a descriptor turned out to be unavailable
    slots: Vec<OnceCell<Option<CompileFn>>>,
}

impl DetectState {
    fn new(descriptors: usize) -> Self {
        Self {
            active: OnceCell::new(),
            slots: (0..descriptors).map(|_| OnceCell::new()).collect(),
        }
    }
}

/// Ordered list of compiler descriptors plus the memoized active compiler.
///
/// Concurrent first calls to [`detect`](Self::detect) share one detection,
/// and each descriptor is instantiated at most once per generation.
pub struct CompilerRegistry {
    descriptors: Vec<Arc<dyn CompilerDescriptor>>,
    selector: Option<String>,
    state: RwLock<Arc<DetectState>>,
}

impl CompilerRegistry {
    /// Registry over the npm backends, honoring `config.compiler`
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_descriptors(BackendDescriptor::all(config), config.compiler.clone())
    }

    /// Registry over arbitrary descriptors
    pub fn with_descriptors(
        descriptors: Vec<Arc<dyn CompilerDescriptor>>,
        selector: Option<String>,
    ) -> Self {
        let state = DetectState::new(descriptors.len());
        Self {
            descriptors,
            selector,
            state: RwLock::new(Arc::new(state)),
        }
    }

    /// Names of the known descriptors, in detection order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name())
    }

    /// The active compiler, detecting it on first use.
    ///
    /// Failed detections are not memoized; the next call tries again, though
    /// descriptors already found unavailable are not re-instantiated.
    pub async fn detect(&self) -> Result<CompileFn> {
        let state = self.state.read().clone();
        state
            .active
            .get_or_try_init(|| self.select(&state))
            .await
            .cloned()
    }

    async fn select(&self, state: &DetectState) -> Result<CompileFn> {
        if let Some(name) = &self.selector {
            let index = self
                .descriptors
                .iter()
                .position(|d| d.name() == name)
                .ok_or_else(|| LoaderError::UnknownCompiler(name.clone()))?;
            return match self.instantiate(state, index).await? {
                Some(compile) => {
                    info!(compiler = %name, "using selected TypeScript compiler");
                    Ok(compile)
                }
                None => Err(LoaderError::BackendUnavailable(name.clone())),
            };
        }

        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if let Some(compile) = self.instantiate(state, index).await? {
                info!(compiler = descriptor.name(), "detected TypeScript compiler");
                return Ok(compile);
            }
        }
        Err(LoaderError::NoCompilerAvailable)
    }

    async fn instantiate(&self, state: &DetectState, index: usize) -> Result<Option<CompileFn>> {
        let descriptor = &self.descriptors[index];
        state.slots[index]
            .get_or_try_init(|| async {
                match descriptor.instantiate().await {
                    Ok(compile) => Ok(Some(compile)),
                    Err(LoaderError::BackendUnavailable(_)) => {
                        debug!(compiler = descriptor.name(), "compiler unavailable, skipping");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .cloned()
    }

    /// Forget the active compiler and every instantiation attempt
    pub fn clear(&self) {
        *self.state.write() = Arc::new(DetectState::new(self.descriptors.len()));
    }

    /// Use `compile` for every later transform, skipping detection
    pub fn override_with(&self, compile: CompileFn) {
        let mut state = DetectState::new(self.descriptors.len());
        state.active = OnceCell::new_with(Some(compile));
        *self.state.write() = Arc::new(state);
    }
}

impl std::fmt::Debug for CompilerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerRegistry")
            .field("descriptors", &self.names().collect::<Vec<_>>())
            .field("selector", &self.selector)
            .field("detected", &self.state.read().active.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compile;
    use crate::tsconfig::CompilerOptions;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Outcome {
        Ready,
        Missing,
        Broken,
    }

    struct Named(&'static str);

    #[async_trait]
    impl Compile for Named {
        async fn compile(&self, code: &str, _: &Path, _: &CompilerOptions) -> Result<String> {
            Ok(format!("{}:{code}", self.0))
        }
    }

    struct Mock {
        name: &'static str,
        outcome: Outcome,
        attempts: AtomicUsize,
    }

    impl Mock {
        fn new(name: &'static str, outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                attempts: AtomicUsize::new(0),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompilerDescriptor for Mock {
        fn name(&self) -> &str {
            self.name
        }

        async fn instantiate(&self) -> Result<CompileFn> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            match self.outcome {
                Outcome::Ready => Ok(Arc::new(Named(self.name))),
                Outcome::Missing => Err(LoaderError::BackendUnavailable(self.name.into())),
                Outcome::Broken => Err(LoaderError::Compile {
                    backend: "mock",
                    filename: "init".into(),
                    message: "broken install".into(),
                }),
            }
        }
    }

    fn registry(mocks: &[Arc<Mock>], selector: Option<&str>) -> CompilerRegistry {
        let descriptors = mocks
            .iter()
            .map(|m| m.clone() as Arc<dyn CompilerDescriptor>)
            .collect();
        CompilerRegistry::with_descriptors(descriptors, selector.map(str::to_string))
    }

    async fn run(registry: &CompilerRegistry) -> String {
        let compile = registry.detect().await.unwrap();
        compile
            .compile("x", Path::new("/a.ts"), &CompilerOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_detect_picks_first_available() {
        let mocks = [
            Mock::new("swc", Outcome::Missing),
            Mock::new("esbuild", Outcome::Ready),
            Mock::new("tsc", Outcome::Ready),
        ];
        let registry = registry(&mocks, None);

        assert_eq!(run(&registry).await, "esbuild:x");
        assert_eq!(mocks[0].attempts(), 1);
        assert_eq!(mocks[1].attempts(), 1);
        assert_eq!(mocks[2].attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_detect_aborts_on_other_errors() {
        let mocks = [
            Mock::new("swc", Outcome::Broken),
            Mock::new("esbuild", Outcome::Ready),
        ];
        let registry = registry(&mocks, None);

        let err = registry.detect().await.err().unwrap();
        assert_eq!(err.code(), "ERR_COMPILE");
        assert_eq!(mocks[1].attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_compiler_available() {
        let mocks = [
            Mock::new("swc", Outcome::Missing),
            Mock::new("tsc", Outcome::Missing),
        ];
        let registry = registry(&mocks, None);

        let err = registry.detect().await.err().unwrap();
        assert!(matches!(err, LoaderError::NoCompilerAvailable));

        // unavailability is remembered
        registry.detect().await.err().unwrap();
        assert_eq!(mocks[0].attempts(), 1);
        assert_eq!(mocks[1].attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_selection_attempts_one_descriptor() {
        let mocks = [
            Mock::new("swc", Outcome::Ready),
            Mock::new("sucrase", Outcome::Ready),
        ];
        let registry = registry(&mocks, Some("sucrase"));

        assert_eq!(run(&registry).await, "sucrase:x");
        assert_eq!(mocks[0].attempts(), 0);
        assert_eq!(mocks[1].attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_selection_unavailable() {
        let mocks = [
            Mock::new("swc", Outcome::Missing),
            Mock::new("tsc", Outcome::Ready),
        ];
        let registry = registry(&mocks, Some("swc"));

        let err = registry.detect().await.err().unwrap();
        assert!(matches!(err, LoaderError::BackendUnavailable(ref name) if name == "swc"));
        assert_eq!(mocks[1].attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_selector_attempts_nothing() {
        let mocks = [Mock::new("swc", Outcome::Ready), Mock::new("tsc", Outcome::Ready)];
        let registry = registry(&mocks, Some("FOO_BAR"));

        let err = registry.detect().await.err().unwrap();
        assert!(matches!(err, LoaderError::UnknownCompiler(ref name) if name == "FOO_BAR"));
        assert!(mocks.iter().all(|m| m.attempts() == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_detection_instantiates_once() {
        let mocks = [Mock::new("swc", Outcome::Ready)];
        let registry = registry(&mocks, None);

        let results = futures::future::join_all((0..8).map(|_| registry.detect())).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(mocks[0].attempts(), 1);

        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_detection_shared_across_worker_threads() {
        let mocks = [Mock::new("swc", Outcome::Missing), Mock::new("tsc", Outcome::Ready)];
        let registry = Arc::new(registry(&mocks, None));

        let handles = (0..16).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.detect().await })
        });
        let results = futures::future::try_join_all(handles).await.unwrap();

        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
        assert_eq!(mocks[0].attempts(), 1);
        assert_eq!(mocks[1].attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_override() {
        let mocks = [Mock::new("swc", Outcome::Ready)];
        let registry = registry(&mocks, None);
        assert_eq!(run(&registry).await, "swc:x");

        registry.override_with(Arc::new(Named("override")));
        assert_eq!(run(&registry).await, "override:x");
        assert_eq!(mocks[0].attempts(), 1);

        registry.clear();
        assert_eq!(run(&registry).await, "swc:x");
        assert_eq!(mocks[0].attempts(), 2);
    }
}
