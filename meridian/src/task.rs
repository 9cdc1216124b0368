//! Cancellable rendering and encoding on tokio's blocking thread pool.
//!
//! Tasks must be spawned from within a tokio runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::MapError;
use crate::image::{EncodeOptions, Image};
use crate::map::Map;
use crate::render::RenderOptions;

/// Shared flag requesting a running operation to stop.
///
/// Rendering checks the token before painting each layer, so a layer that is being painted is
/// always finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

static ACTIVE_TASKS: AtomicUsize = AtomicUsize::new(0);

fn spawn_tracked<T, F>(name: &'static str, f: F) -> JoinHandle<Result<T, MapError>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MapError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        log::debug!(
            "Started {name} task, active: {}",
            ACTIVE_TASKS.fetch_add(1, Ordering::Relaxed) + 1
        );
        let result = f();
        log::debug!(
            "Finished {name} task, active: {}",
            ACTIVE_TASKS.fetch_sub(1, Ordering::Relaxed) - 1
        );
        result
    })
}

async fn join_handle<T>(handle: JoinHandle<Result<T, MapError>>) -> Result<T, MapError> {
    handle
        .await
        .map_err(|err| MapError::Task(err.to_string()))?
}

/// Map rendering running in the background.
///
/// ```
/// use std::sync::Arc;
/// use meridian::task::RenderTask;
/// use meridian::{Image, Map, RenderOptions};
/// use meridian_types::cartesian::Rect;
///
/// # tokio_test::block_on(async {
/// let mut map = Map::new(64, 64).unwrap();
/// map.zoom_to_box(Rect::new(-10.0, -10.0, 10.0, 10.0)).unwrap();
/// let target = Image::new(64, 64).unwrap();
///
/// let task = RenderTask::spawn(Arc::new(map), target, RenderOptions::default());
/// let image = task.join().await.unwrap();
/// assert!(!image.painted());
/// # });
/// ```
#[derive(Debug)]
pub struct RenderTask {
    token: CancelToken,
    handle: JoinHandle<Result<Image, MapError>>,
}

impl RenderTask {
    /// Starts rendering the map into the target image.
    pub fn spawn(map: Arc<Map>, target: Image, options: RenderOptions) -> Self {
        let token = CancelToken::new();
        let task_token = token.clone();
        let handle = spawn_tracked("render", move || {
            let mut target = target;
            map.render_cancellable(&mut target, &options, &task_token)?;
            Ok(target)
        });

        Self { token, handle }
    }

    /// Token of the task, can be shared with other code that needs to stop it.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Stops the rendering before the next layer is painted.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the task and returns the rendered image, or [`MapError::Cancelled`] if the
    /// task was cancelled before it finished.
    pub async fn join(self) -> Result<Image, MapError> {
        join_handle(self.handle).await
    }
}

/// Image encoding running in the background.
#[derive(Debug)]
pub struct EncodeTask {
    token: CancelToken,
    handle: JoinHandle<Result<Vec<u8>, MapError>>,
}

impl EncodeTask {
    /// Starts encoding the image with the given format string.
    pub fn spawn(image: Image, format: impl Into<String>, options: EncodeOptions) -> Self {
        let token = CancelToken::new();
        let task_token = token.clone();
        let format = format.into();
        let handle = spawn_tracked("encode", move || {
            if task_token.is_cancelled() {
                return Err(MapError::Cancelled);
            }

            image.encode(&format, &options)
        });

        Self { token, handle }
    }

    /// Prevents the encoding from starting if it has not started yet. Encoding in progress
    /// runs to completion.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the encoded bytes.
    pub async fn join(self) -> Result<Vec<u8>, MapError> {
        join_handle(self.handle).await
    }
}
