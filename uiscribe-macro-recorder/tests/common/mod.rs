//! Mock collaborators shared by the integration suites.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uiscribe::{
    AccessibilityProvider, AutomationError, Element, ElementNode, Point, ProcessIndex, Rect,
    ScreenCapture, VerificationOutcome, VerificationRequest, VerificationService, WindowHandle,
    WindowInfo,
};
use uiscribe_macro_recorder::{
    InputEvent, InputInjector, InputSource, ListenerGuard, MacroError, MouseButton,
};

pub struct MockProvider {
    pub windows: Vec<WindowInfo>,
    pub subtrees: HashMap<WindowHandle, ElementNode>,
    pub cursor: Point,
}

impl MockProvider {
    pub fn empty() -> Self {
        Self {
            windows: Vec::new(),
            subtrees: HashMap::new(),
            cursor: Point::new(0, 0),
        }
    }

    /// One 800x600 window exposing a single Button at (480,290)-(520,310).
    pub fn with_button() -> Self {
        let bounds = Rect::new(0, 0, 800, 600);
        let mut provider = Self::empty();
        provider.windows.push(WindowInfo {
            handle: 1,
            class_name: "AppWindow".to_string(),
            title: "Demo".to_string(),
            bounds,
        });
        provider.subtrees.insert(
            1,
            ElementNode::with_children(
                Element::new(uiscribe::ControlType::Window, "Demo", bounds),
                vec![ElementNode::new(Element::new(
                    uiscribe::ControlType::Button,
                    "Submit",
                    Rect::new(480, 290, 520, 310),
                ))],
            ),
        );
        provider
    }
}

impl AccessibilityProvider for MockProvider {
    fn window_at(&self, point: Point) -> Result<Option<WindowInfo>, AutomationError> {
        Ok(self
            .windows
            .iter()
            .find(|w| w.bounds.contains(point))
            .cloned())
    }

    fn child_windows(&self, _handle: WindowHandle) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(Vec::new())
    }

    fn process_of(&self, _handle: WindowHandle) -> Result<Option<u32>, AutomationError> {
        Ok(None)
    }

    fn window_subtree(
        &self,
        handle: WindowHandle,
    ) -> Result<Option<ElementNode>, AutomationError> {
        Ok(self.subtrees.get(&handle).cloned())
    }

    fn hierarchy_snapshot(
        &self,
        _region: Rect,
        _max_depth: usize,
        _min_size: u32,
    ) -> Result<Vec<ElementNode>, AutomationError> {
        Ok(Vec::new())
    }

    fn screen_size(&self) -> (u32, u32) {
        (1920, 1080)
    }

    fn cursor_position(&self) -> Point {
        self.cursor
    }
}

pub struct EmptyProcessIndex;

impl ProcessIndex for EmptyProcessIndex {
    fn name_of(&self, _pid: u32) -> Option<String> {
        None
    }

    fn running_names(&self) -> Vec<String> {
        Vec::new()
    }
}

pub struct SolidCapture;

impl ScreenCapture for SolidCapture {
    fn capture(&self, region: Option<Rect>) -> Result<RgbaImage, AutomationError> {
        let full = Rect::new(0, 0, 1920, 1080);
        let region = region.unwrap_or(full).clamp_to(full);
        Ok(RgbaImage::from_pixel(
            region.width().max(1) as u32,
            region.height().max(1) as u32,
            Rgba([30, 30, 30, 255]),
        ))
    }

    fn screen_size(&self) -> Result<(u32, u32), AutomationError> {
        Ok((1920, 1080))
    }
}

/// Input source driven by hand from tests.
pub struct ManualInputSource {
    callback: Mutex<Option<uiscribe_macro_recorder::listener::InputCallback>>,
    delivering: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    pub fail_attach: bool,
}

impl ManualInputSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(None),
            delivering: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            fail_attach: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(None),
            delivering: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            fail_attach: true,
        })
    }

    /// Deliver an event the way the platform hook would.
    pub fn emit(&self, event: InputEvent) {
        if self.stopped.load(Ordering::SeqCst) || !self.delivering.load(Ordering::SeqCst) {
            return;
        }
        let callback = self.callback.lock().unwrap();
        if let Some(callback) = callback.as_ref() {
            callback(event);
        }
    }
}

impl InputSource for ManualInputSource {
    fn attach(
        &self,
        callback: uiscribe_macro_recorder::listener::InputCallback,
    ) -> uiscribe_macro_recorder::Result<ListenerGuard> {
        if self.fail_attach {
            return Err(MacroError::ListenerError("hook unavailable".to_string()));
        }
        *self.callback.lock().unwrap() = Some(callback);
        self.delivering.store(true, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        Ok(ListenerGuard::new(
            Arc::clone(&self.delivering),
            Arc::clone(&self.stopped),
        ))
    }
}

/// Injector that records calls and can fail on a chosen one.
pub struct ScriptedInjector {
    pub calls: Arc<Mutex<Vec<String>>>,
    fail_on_call: Option<usize>,
    counter: AtomicUsize,
}

impl ScriptedInjector {
    pub fn new() -> (Box<Self>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                calls: Arc::clone(&calls),
                fail_on_call: None,
                counter: AtomicUsize::new(0),
            }),
            calls,
        )
    }

    /// Fail the `n`-th dispatch (1-based).
    pub fn failing_on(n: usize) -> (Box<Self>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                calls: Arc::clone(&calls),
                fail_on_call: Some(n),
                counter: AtomicUsize::new(0),
            }),
            calls,
        )
    }

    fn record(&self, call: String) -> uiscribe_macro_recorder::Result<()> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(call);
        if self.fail_on_call == Some(n) {
            return Err(MacroError::DispatchError(format!("scripted failure at {n}")));
        }
        Ok(())
    }
}

impl InputInjector for ScriptedInjector {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> uiscribe_macro_recorder::Result<()> {
        self.record(format!("click({x},{y},{button:?})"))
    }

    fn scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> uiscribe_macro_recorder::Result<()> {
        self.record(format!("scroll({x},{y},{dx},{dy})"))
    }

    fn type_text(&mut self, text: &str) -> uiscribe_macro_recorder::Result<()> {
        self.record(format!("type({text})"))
    }

    fn press_key(&mut self, key: &str) -> uiscribe_macro_recorder::Result<()> {
        self.record(format!("key({key})"))
    }
}

/// Verifier answering from a script of verdicts, one per call.
pub struct ScriptedVerifier {
    verdicts: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn new(verdicts: Vec<bool>) -> Arc<Self> {
        Arc::new(Self {
            verdicts,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VerificationService for ScriptedVerifier {
    async fn verify(&self, _request: VerificationRequest) -> VerificationOutcome {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let passed = self.verdicts.get(index).copied().unwrap_or(true);
        if passed {
            VerificationOutcome::passed("scripted pass")
        } else {
            VerificationOutcome::failed("scripted failure")
        }
    }
}
