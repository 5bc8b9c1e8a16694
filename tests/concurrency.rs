mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::{StubDevice, StubImage, Tint, init_logging};
use shaderfx::{
    EffectError, EffectInstance, EffectProperty, ImageRequest, ImageSource, NativeImage,
    PropertyKey, ResolvedImage, ShaderEffect,
};

/// Source that parks the resolving thread until it is released.
struct GatedSource {
    image: NativeImage,
    entered: Sender<()>,
    release: Mutex<Receiver<()>>,
}

impl GatedSource {
    fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered, on_entered) = mpsc::channel();
        let (release, on_release) = mpsc::channel();
        let source = Arc::new(Self {
            image: NativeImage::new(StubImage {
                width: 8.0,
                height: 8.0,
            }),
            entered,
            release: Mutex::new(on_release),
        });
        (source, on_entered, release)
    }
}

impl ImageSource for GatedSource {
    fn get_image(&self, _request: &ImageRequest<'_>) -> shaderfx::Result<ResolvedImage> {
        let _ = self.entered.send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(ResolvedImage::new(self.image.clone(), 0.0))
    }
}

#[test]
fn concurrent_resolution_fails_fast_instead_of_blocking() {
    init_logging();
    let device = StubDevice::new();
    let (gate, entered, release) = GatedSource::new();
    let tint = EffectInstance::<Tint>::new();
    tint.set_input(gate).unwrap();

    thread::scope(|s| {
        let first = s.spawn(|| tint.get_image(&ImageRequest::new(&device.handle())));
        entered.recv().unwrap();

        let second = tint.get_image(&ImageRequest::new(&device.handle()));
        assert!(matches!(second, Err(EffectError::CyclicGraph)));

        release.send(()).unwrap();
        let first = first.join().unwrap().unwrap();
        assert!(first.image.is_some());
    });

    assert!(tint.is_realized());
    assert_eq!(device.creations_of(Tint::TYPE_ID), 1);
}

#[test]
fn setters_wait_for_an_ongoing_resolution() {
    let device = StubDevice::new();
    let (gate, entered, release) = GatedSource::new();
    let tint = EffectInstance::<Tint>::new();
    tint.set_input(gate).unwrap();
    let written = AtomicBool::new(false);

    thread::scope(|s| {
        let resolver = s.spawn(|| tint.get_image(&ImageRequest::new(&device.handle())));
        entered.recv().unwrap();

        let setter = s.spawn(|| {
            tint.set_constant_buffer(&2.0f32.to_le_bytes()).unwrap();
            written.store(true, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!written.load(Ordering::SeqCst));

        release.send(()).unwrap();
        resolver.join().unwrap().unwrap();
        setter.join().unwrap();
    });

    assert!(written.load(Ordering::SeqCst));
    // The write landed on the realized native effect, not a stale cache.
    assert!(matches!(
        device
            .native_of(Tint::TYPE_ID)
            .stored(PropertyKey::ConstantBuffer),
        Some(EffectProperty::ConstantBuffer(bytes)) if bytes == 2.0f32.to_le_bytes()
    ));
}

#[test]
fn parallel_setters_and_draws_stay_consistent() {
    let device = StubDevice::new();
    let tint = EffectInstance::<Tint>::new();
    tint.set_input(common::StubBitmap::shared(0.0)).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for step in 0..200u32 {
                tint.set_constant_buffer(&(step as f32).to_le_bytes())
                    .unwrap();
            }
        });
        for _ in 0..200 {
            tint.get_image(&ImageRequest::new(&device.handle())).unwrap();
        }
    });

    assert_eq!(tint.constant_buffer().unwrap(), 199.0f32.to_le_bytes());
    assert_eq!(device.creations_of(Tint::TYPE_ID), 1);
}
