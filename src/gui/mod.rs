//! The application window.
//!
//! The window is driven by a [`winit`] event loop on the main thread. Other threads publish frames
//! into the window's [`DisplaySlot`] and wake the event loop through a [`Poster`], which forwards
//! [`Notice`]s into it.

mod gpu;
mod layout;
mod renderer;

use std::{
    rc::Rc,
    sync::{Arc, Mutex},
};

use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
};

use crate::present::{DisplaySlot, Notice, PresentationSink, STATUS_SELECT_IMAGE};

pub use self::layout::Layout;
use self::{gpu::Gpu, renderer::Renderer};

/// Something the user asked for through the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Choose a new image to zoom into.
    SelectImage,
    /// Close the window and shut down.
    Exit,
}

/// A [`PresentationSink`] that wakes up the window's event loop.
pub struct Poster {
    proxy: Mutex<EventLoopProxy<Notice>>,
}

impl PresentationSink for Poster {
    fn post(&self, notice: Notice) -> bool {
        let proxy = self.proxy.lock().unwrap_or_else(|e| e.into_inner());
        proxy.send_event(notice).is_ok()
    }
}

pub struct Gui {
    event_loop: EventLoop<Notice>,
    renderer: Renderer,
    slot: Arc<DisplaySlot>,
    layout: Layout,
}

impl Gui {
    /// Opens the window and the GPU used to draw into it.
    pub fn new(title: &str) -> anyhow::Result<Self> {
        let event_loop = EventLoopBuilder::with_user_event().build();
        let gpu = Rc::new(pollster::block_on(Gpu::open())?);
        let window = renderer::open_window(&*event_loop, title, Layout::DEFAULT_WINDOW)?;
        let renderer = Renderer::new(window, gpu)?;
        let layout = Layout::new(renderer.resolution());

        Ok(Self {
            event_loop,
            renderer,
            slot: Arc::new(DisplaySlot::new(STATUS_SELECT_IMAGE)),
            layout,
        })
    }

    /// Returns a sink that may be used from any thread to update the window's contents.
    pub fn poster(&self) -> Poster {
        Poster {
            proxy: Mutex::new(self.event_loop.create_proxy()),
        }
    }

    /// Returns the slot the window draws from.
    ///
    /// Frames published into it are shown after posting [`Notice::FrameReady`] to the
    /// [`Gui::poster`].
    pub fn display(&self) -> Arc<DisplaySlot> {
        self.slot.clone()
    }

    /// Runs the event loop until the window is closed.
    ///
    /// `on_action` is invoked on the event loop thread whenever the user triggers a [`UiAction`].
    pub fn run(self, mut on_action: impl FnMut(UiAction) + 'static) -> ! {
        let Self {
            event_loop,
            mut renderer,
            slot,
            layout,
        } = self;

        event_loop.run(move |event, _target, flow| {
            *flow = ControlFlow::Wait;

            let action = match event {
                Event::UserEvent(notice) => {
                    if let Notice::Status(status) = notice {
                        slot.set_status(status);
                    }
                    renderer.window().request_redraw();
                    None
                }
                Event::RedrawRequested(id) if id == renderer.window().id() => {
                    let canvas = layout.render(&slot.snapshot());
                    renderer.upload(&canvas);
                    if let Err(e) = renderer.redraw() {
                        log::error!("failed to redraw window: {:#}", e);
                    }
                    None
                }
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => Some(UiAction::Exit),
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(key),
                                ..
                            },
                        ..
                    } => match key {
                        VirtualKeyCode::O => Some(UiAction::SelectImage),
                        VirtualKeyCode::Escape | VirtualKeyCode::Q => Some(UiAction::Exit),
                        _ => None,
                    },
                    _ => None,
                },
                _ => None,
            };

            if let Some(action) = action {
                log::debug!("ui action: {:?}", action);
                on_action(action);
                match action {
                    UiAction::Exit => *flow = ControlFlow::Exit,
                    // The status line may have been changed synchronously.
                    UiAction::SelectImage => renderer.window().request_redraw(),
                }
            }
        })
    }
}
