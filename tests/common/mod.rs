//! Shared test support: a counting stub standing in for the native
//! multimedia library.
//!
//! Resources are real heap allocations cast to the opaque pointee types, so
//! every create/free pair is observable and a double free would be a real
//! one (caught by miri or the allocator, not just by the counters).

#![allow(dead_code)] // each integration suite uses a subset

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;

use mediabridge_v8::{
    ByteStream, GlContext, InputDevice, MediaError, MediaLibrary, PixelSurface, Runtime, SendPtr,
    Window,
};

struct StubSurface {
    format: u32,
    data: Vec<u8>,
}

struct StubWindow {
    title: String,
    backing: Box<StubSurface>,
}

struct StubContext {
    window: usize,
}

struct StubStream {
    data: Vec<u8>,
    cursor: usize,
}

struct StubDevice {
    name: String,
}

#[derive(Default)]
pub struct Counts {
    pub windows_created: AtomicUsize,
    pub windows_freed: AtomicUsize,
    pub contexts_created: AtomicUsize,
    pub contexts_freed: AtomicUsize,
    pub surfaces_created: AtomicUsize,
    pub surfaces_freed: AtomicUsize,
    pub streams_opened: AtomicUsize,
    pub streams_freed: AtomicUsize,
    pub loads: AtomicUsize,
    pub saves: AtomicUsize,
    pub conversions: AtomicUsize,
    pub current_cleared: AtomicUsize,
}

pub struct StubMedia {
    pub counts: Counts,
    current: Mutex<Option<(usize, usize)>>,
    devices: Vec<Box<StubDevice>>,
}

impl StubMedia {
    pub fn new() -> Self {
        Self {
            counts: Counts::default(),
            current: Mutex::new(None),
            devices: vec![
                Box::new(StubDevice {
                    name: "pad-0".to_string(),
                }),
                Box::new(StubDevice {
                    name: "pad-1".to_string(),
                }),
            ],
        }
    }

    pub fn current_pair(&self) -> Option<(usize, usize)> {
        *self.current.lock().unwrap()
    }
}

impl MediaLibrary for StubMedia {
    fn create_window(
        &self,
        title: &str,
        _width: u32,
        _height: u32,
    ) -> Result<SendPtr<Window>, MediaError> {
        self.counts.windows_created.fetch_add(1, Ordering::SeqCst);
        let window = Box::new(StubWindow {
            title: title.to_string(),
            backing: Box::new(StubSurface {
                format: 0,
                data: vec![0; 16],
            }),
        });
        Ok(SendPtr::new(Box::into_raw(window) as *mut Window))
    }

    fn destroy_window(&self, window: SendPtr<Window>) {
        self.counts.windows_freed.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(window.get() as *mut StubWindow)) };
    }

    fn window_title(&self, window: SendPtr<Window>) -> String {
        let window = unsafe { &*(window.get() as *const StubWindow) };
        window.title.clone()
    }

    fn create_context(&self, window: SendPtr<Window>) -> Result<SendPtr<GlContext>, MediaError> {
        self.counts.contexts_created.fetch_add(1, Ordering::SeqCst);
        let context = Box::new(StubContext {
            window: window.get() as usize,
        });
        Ok(SendPtr::new(Box::into_raw(context) as *mut GlContext))
    }

    fn delete_context(&self, context: SendPtr<GlContext>) {
        self.counts.contexts_freed.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(context.get() as *mut StubContext)) };
    }

    fn make_current(
        &self,
        window: SendPtr<Window>,
        context: SendPtr<GlContext>,
    ) -> Result<(), MediaError> {
        let ctx = unsafe { &*(context.get() as *const StubContext) };
        if ctx.window != window.get() as usize {
            return Err(MediaError::new("context belongs to a different window"));
        }
        *self.current.lock().unwrap() = Some((window.get() as usize, context.get() as usize));
        Ok(())
    }

    fn clear_current(&self) {
        self.counts.current_cleared.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
    }

    fn load_surface(&self, path: &str) -> Result<SendPtr<PixelSurface>, MediaError> {
        self.counts.loads.fetch_add(1, Ordering::SeqCst);
        if path.contains("slow") {
            std::thread::sleep(Duration::from_millis(50));
        }
        if path.contains("missing") {
            return Err(MediaError::new(format!("no such file: {path}")));
        }
        self.counts.surfaces_created.fetch_add(1, Ordering::SeqCst);
        let surface = Box::new(StubSurface {
            format: 0,
            data: path.as_bytes().to_vec(),
        });
        Ok(SendPtr::new(Box::into_raw(surface) as *mut PixelSurface))
    }

    fn save_surface(
        &self,
        surface: SendPtr<PixelSurface>,
        path: &str,
    ) -> Result<(), MediaError> {
        // Touch the pixels to prove the pointer is still valid mid-task.
        let surface = unsafe { &*(surface.get() as *const StubSurface) };
        let _ = surface.data.len();
        if path.contains("readonly") {
            return Err(MediaError::new(format!("cannot write: {path}")));
        }
        self.counts.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn convert_surface(
        &self,
        surface: SendPtr<PixelSurface>,
        format: u32,
    ) -> Result<SendPtr<PixelSurface>, MediaError> {
        self.counts.conversions.fetch_add(1, Ordering::SeqCst);
        let source = unsafe { &*(surface.get() as *const StubSurface) };
        self.counts.surfaces_created.fetch_add(1, Ordering::SeqCst);
        let converted = Box::new(StubSurface {
            format,
            data: source.data.clone(),
        });
        Ok(SendPtr::new(Box::into_raw(converted) as *mut PixelSurface))
    }

    fn free_surface(&self, surface: SendPtr<PixelSurface>) {
        self.counts.surfaces_freed.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(surface.get() as *mut StubSurface)) };
    }

    fn window_surface(&self, window: SendPtr<Window>) -> Result<SendPtr<PixelSurface>, MediaError> {
        let window = unsafe { &mut *(window.get() as *mut StubWindow) };
        Ok(SendPtr::new(
            &mut *window.backing as *mut StubSurface as *mut PixelSurface,
        ))
    }

    fn open_stream(&self, path: &str) -> Result<SendPtr<ByteStream>, MediaError> {
        self.counts.streams_opened.fetch_add(1, Ordering::SeqCst);
        let stream = Box::new(StubStream {
            data: path.as_bytes().to_vec(),
            cursor: 0,
        });
        Ok(SendPtr::new(Box::into_raw(stream) as *mut ByteStream))
    }

    fn read_stream(&self, stream: SendPtr<ByteStream>, len: usize) -> Result<Bytes, MediaError> {
        let stream = unsafe { &mut *(stream.get() as *mut StubStream) };
        let end = (stream.cursor + len).min(stream.data.len());
        let chunk = Bytes::copy_from_slice(&stream.data[stream.cursor..end]);
        stream.cursor = end;
        Ok(chunk)
    }

    fn close_stream(&self, stream: SendPtr<ByteStream>) {
        self.counts.streams_freed.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(stream.get() as *mut StubStream)) };
    }

    fn input_device(&self, index: u32) -> Result<SendPtr<InputDevice>, MediaError> {
        // Out-of-range lookups return the library's "no device" sentinel,
        // which the bridge must surface as script-level null.
        match self.devices.get(index as usize) {
            Some(device) => Ok(SendPtr::new(
                &**device as *const StubDevice as *mut StubDevice as *mut InputDevice,
            )),
            None => Ok(SendPtr::null()),
        }
    }

    fn input_device_name(&self, device: SendPtr<InputDevice>) -> String {
        let device = unsafe { &*(device.get() as *const StubDevice) };
        device.name.clone()
    }
}

/// Fresh runtime over a counting stub, with the task pool already running
/// on the ambient tokio runtime.
pub fn new_runtime() -> (Runtime, Arc<StubMedia>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let stub = Arc::new(StubMedia::new());
    let (runtime, pool) = Runtime::new(stub.clone());
    tokio::spawn(pool.run());
    (runtime, stub)
}

/// Shorthand for reading a counter in assertions.
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
