//! Events Module
//!
//! Translates raw x11rb events into the [`WmEvent`]s the window manager
//! dispatches on. Everything the core does not react to is dropped here.

use tracing::{debug, warn};
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{Atom, ConfigWindow, Property, Timestamp, Window};

/// Fields of a ConfigureRequest that the client actually set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureFields {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Pointer button event, coordinates in both root and event space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub window: Window,
    pub button: u8,
    pub root_x: i32,
    pub root_y: i32,
    pub event_x: i32,
    pub event_y: i32,
    pub state: u16,
    pub time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmEvent {
    MapRequest {
        window: Window,
    },
    UnmapNotify {
        window: Window,
        synthetic: bool,
    },
    DestroyNotify {
        window: Window,
    },
    ConfigureRequest {
        window: Window,
        fields: ConfigureFields,
    },
    PropertyNotify {
        window: Window,
        atom: Atom,
        deleted: bool,
    },
    ClientMessage {
        window: Window,
        message_type: Atom,
        data: [u32; 5],
    },
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    Motion {
        root_x: i32,
        root_y: i32,
        time: Timestamp,
    },
    KeyPress {
        keycode: u8,
        state: u16,
        time: Timestamp,
    },
    Expose {
        window: Window,
        count: u16,
    },
    /// RandR reported a change in outputs or screen size
    ScreenChange,
    /// Keyboard mapping changed; key grabs must be redone
    KeyboardMapping,
}

fn button(
    window: Window,
    detail: u8,
    root: (i16, i16),
    event: (i16, i16),
    state: u16,
    time: Timestamp,
) -> ButtonEvent {
    ButtonEvent {
        window,
        button: detail,
        root_x: root.0 as i32,
        root_y: root.1 as i32,
        event_x: event.0 as i32,
        event_y: event.1 as i32,
        state,
        time,
    }
}

/// Translate one event; `None` for events the core ignores
pub fn translate(event: &Event) -> Option<WmEvent> {
    Some(match event {
        Event::MapRequest(e) => WmEvent::MapRequest { window: e.window },
        Event::UnmapNotify(e) => WmEvent::UnmapNotify {
            window: e.window,
            synthetic: e.response_type & 0x80 != 0,
        },
        Event::DestroyNotify(e) => WmEvent::DestroyNotify { window: e.window },
        Event::ConfigureRequest(e) => {
            let mask = e.value_mask;
            WmEvent::ConfigureRequest {
                window: e.window,
                fields: ConfigureFields {
                    x: mask.contains(ConfigWindow::X).then_some(e.x as i32),
                    y: mask.contains(ConfigWindow::Y).then_some(e.y as i32),
                    width: mask.contains(ConfigWindow::WIDTH).then_some(e.width as u32),
                    height: mask.contains(ConfigWindow::HEIGHT).then_some(e.height as u32),
                },
            }
        }
        Event::PropertyNotify(e) => WmEvent::PropertyNotify {
            window: e.window,
            atom: e.atom,
            deleted: e.state == Property::DELETE,
        },
        Event::ClientMessage(e) => {
            if e.format != 32 {
                debug!("Ignoring client message with format {}", e.format);
                return None;
            }
            WmEvent::ClientMessage {
                window: e.window,
                message_type: e.type_,
                data: e.data.as_data32(),
            }
        }
        Event::ButtonPress(e) => WmEvent::ButtonPress(button(
            e.event,
            e.detail,
            (e.root_x, e.root_y),
            (e.event_x, e.event_y),
            u16::from(e.state),
            e.time,
        )),
        Event::ButtonRelease(e) => WmEvent::ButtonRelease(button(
            e.event,
            e.detail,
            (e.root_x, e.root_y),
            (e.event_x, e.event_y),
            u16::from(e.state),
            e.time,
        )),
        Event::MotionNotify(e) => WmEvent::Motion {
            root_x: e.root_x as i32,
            root_y: e.root_y as i32,
            time: e.time,
        },
        Event::KeyPress(e) => WmEvent::KeyPress {
            keycode: e.detail,
            state: u16::from(e.state),
            time: e.time,
        },
        Event::Expose(e) => WmEvent::Expose {
            window: e.window,
            count: e.count,
        },
        Event::RandrScreenChangeNotify(_) | Event::RandrNotify(_) => WmEvent::ScreenChange,
        Event::MappingNotify(_) => WmEvent::KeyboardMapping,
        Event::Error(e) => {
            warn!(
                "X error {:?} on request {}.{} (resource 0x{:x})",
                e.error_kind, e.major_opcode, e.minor_opcode, e.bad_value
            );
            return None;
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::{
        ClientMessageEvent, ConfigureRequestEvent, StackMode, UnmapNotifyEvent,
    };

    #[test]
    fn test_configure_request_fields() {
        let event = Event::ConfigureRequest(ConfigureRequestEvent {
            response_type: 23,
            stack_mode: StackMode::ABOVE,
            sequence: 0,
            parent: 1,
            window: 0x42,
            sibling: 0,
            x: 10,
            y: 20,
            width: 300,
            height: 200,
            border_width: 0,
            value_mask: ConfigWindow::WIDTH | ConfigWindow::HEIGHT,
        });
        assert_eq!(
            translate(&event),
            Some(WmEvent::ConfigureRequest {
                window: 0x42,
                fields: ConfigureFields {
                    x: None,
                    y: None,
                    width: Some(300),
                    height: Some(200),
                },
            })
        );
    }

    #[test]
    fn test_synthetic_unmap() {
        let event = Event::UnmapNotify(UnmapNotifyEvent {
            response_type: 18 | 0x80,
            sequence: 0,
            event: 1,
            window: 0x42,
            from_configure: false,
        });
        assert_eq!(
            translate(&event),
            Some(WmEvent::UnmapNotify {
                window: 0x42,
                synthetic: true,
            })
        );
    }

    #[test]
    fn test_client_message_data() {
        let event = Event::ClientMessage(ClientMessageEvent::new(32, 0x42, 300u32, [1, 2, 3, 4, 5]));
        assert_eq!(
            translate(&event),
            Some(WmEvent::ClientMessage {
                window: 0x42,
                message_type: 300,
                data: [1, 2, 3, 4, 5],
            })
        );
        let bytes = Event::ClientMessage(ClientMessageEvent::new(8, 0x42, 300u32, [0u8; 20]));
        assert_eq!(translate(&bytes), None);
    }
}
