//! Screen Module
//!
//! Output topology: the connected displays, their DPI-derived scale, the
//! primary and last-active output, and the space docks reserve at the
//! screen edges.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;
use crate::wm::conn::{OutputInfo, ScreenSize, XConn};
use crate::wm::hints::Strut;

const BASE_DPI: f64 = 96.0;

/// One physical display
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Integer scale factor, at least 1
    pub scale: u32,
}

impl Output {
    fn from_info(info: &OutputInfo) -> Self {
        Self {
            name: info.name.clone(),
            x: info.geometry.x,
            y: info.geometry.y,
            width: info.geometry.width,
            height: info.geometry.height,
            scale: scale_for(info.geometry.width, info.width_mm),
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.width, self.height)
    }
}

/// Scale from physical width: 96 dpi is 1x, rounded to the nearest integer
pub fn scale_for(width_px: u32, width_mm: u32) -> u32 {
    if width_mm == 0 || width_px == 0 {
        return 1;
    }
    let dpi = width_px as f64 / (width_mm as f64 / 25.4);
    ((dpi / BASE_DPI).round() as u32).max(1)
}

/// Output topology
#[derive(Debug)]
pub struct OutputTopology {
    outputs: Vec<Output>,
    primary: usize,
    active: usize,
    screen: ScreenSize,
    struts: HashMap<Window, Strut>,
}

impl OutputTopology {
    /// Topology with a single output covering the screen, until the first refresh
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            outputs: vec![Output {
                name: "default".to_string(),
                x: 0,
                y: 0,
                width: screen.width,
                height: screen.height,
                scale: scale_for(screen.width, screen.width_mm),
            }],
            primary: 0,
            active: 0,
            screen,
            struts: HashMap::new(),
        }
    }

    /// Re-query outputs. Returns whether the set changed.
    pub fn refresh(&mut self, conn: &dyn XConn) -> Result<bool> {
        self.screen = conn.screen_size();
        let infos = conn.outputs()?;
        Ok(self.apply(&infos))
    }

    /// Install a new output set: ordered left to right then top to bottom,
    /// mirrored or overlapping outputs dropped, and the active output kept
    /// by name when it survives.
    pub fn apply(&mut self, infos: &[OutputInfo]) -> bool {
        let mut sorted: Vec<&OutputInfo> = infos.iter().collect();
        sorted.sort_by_key(|info| (info.geometry.x, info.geometry.y, !info.primary));

        let mut outputs: Vec<Output> = Vec::new();
        let mut primary = None;
        for info in sorted {
            if outputs
                .iter()
                .any(|existing| existing.geometry().intersects(&info.geometry))
            {
                debug!("Skipping overlapping output {}", info.name);
                continue;
            }
            if info.primary && primary.is_none() {
                primary = Some(outputs.len());
            }
            outputs.push(Output::from_info(info));
        }
        if outputs.is_empty() {
            outputs.push(Output {
                name: "default".to_string(),
                x: 0,
                y: 0,
                width: self.screen.width,
                height: self.screen.height,
                scale: scale_for(self.screen.width, self.screen.width_mm),
            });
        }

        if outputs == self.outputs {
            return false;
        }

        let active_name = self.outputs.get(self.active).map(|o| o.name.clone());
        self.primary = primary.unwrap_or(0);
        self.active = active_name
            .and_then(|name| outputs.iter().position(|o| o.name == name))
            .unwrap_or(self.primary);
        self.outputs = outputs;

        for output in &self.outputs {
            info!(
                "Output {}: {}x{}+{}+{} scale {}",
                output.name, output.width, output.height, output.x, output.y, output.scale
            );
        }
        true
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn primary(&self) -> &Output {
        &self.outputs[self.primary]
    }

    pub fn active(&self) -> &Output {
        &self.outputs[self.active]
    }

    /// Mark the output under a point as the one last interacted with
    pub fn set_active_at(&mut self, x: i32, y: i32) {
        if let Some(index) = self.index_at(x, y) {
            self.active = index;
        }
    }

    fn index_at(&self, x: i32, y: i32) -> Option<usize> {
        self.outputs
            .iter()
            .position(|o| o.geometry().contains_point(x, y))
    }

    pub fn for_point(&self, x: i32, y: i32) -> &Output {
        self.index_at(x, y)
            .map(|index| &self.outputs[index])
            .unwrap_or_else(|| self.primary())
    }

    /// Output showing most of a window, else the one under its center,
    /// else the primary output
    pub fn for_window(&self, geometry: Geometry) -> &Output {
        let best = self
            .outputs
            .iter()
            .map(|o| (o.geometry().overlap_area(&geometry), o))
            .filter(|(area, _)| *area > 0)
            .max_by_key(|(area, _)| *area)
            .map(|(_, o)| o);
        match best {
            Some(output) => output,
            None => {
                let (cx, cy) = geometry.center();
                self.for_point(cx, cy)
            }
        }
    }

    pub fn set_strut(&mut self, window: Window, strut: Strut) -> bool {
        if strut.is_empty() {
            return self.remove_strut(window);
        }
        self.struts.insert(window, strut) != Some(strut)
    }

    pub fn remove_strut(&mut self, window: Window) -> bool {
        self.struts.remove(&window).is_some()
    }

    /// Largest reservation per screen edge, never past the screen itself
    fn reserved(&self) -> Strut {
        let (width, height) = (self.screen.width, self.screen.height);
        self.struts.values().fold(Strut::default(), |acc, s| Strut {
            left: acc.left.max(s.left.min(width)),
            right: acc.right.max(s.right.min(width)),
            top: acc.top.max(s.top.min(height)),
            bottom: acc.bottom.max(s.bottom.min(height)),
        })
    }

    /// Output bounds minus the part of any dock reservation reaching into it
    pub fn content_bounds(&self, output: &Output) -> Geometry {
        let reserved = self.reserved();
        let screen_w = self.screen.width as i32;
        let screen_h = self.screen.height as i32;
        let area = output.geometry();

        let left = (reserved.left as i32 - area.x).max(0);
        let top = (reserved.top as i32 - area.y).max(0);
        let right = (reserved.right as i32 - (screen_w - area.right())).max(0);
        let bottom = (reserved.bottom as i32 - (screen_h - area.bottom())).max(0);

        Geometry::new(
            area.x + left,
            area.y + top,
            (area.width as i32 - left - right).max(1) as u32,
            (area.height as i32 - top - bottom).max(1) as u32,
        )
    }

    /// Screen minus reservations, for `_NET_WORKAREA`
    pub fn work_area(&self) -> Geometry {
        let reserved = self.reserved();
        Geometry::new(
            reserved.left as i32,
            reserved.top as i32,
            self.screen
                .width
                .saturating_sub(reserved.left.saturating_add(reserved.right))
                .max(1),
            self.screen
                .height
                .saturating_sub(reserved.top.saturating_add(reserved.bottom))
                .max(1),
        )
    }

    pub fn screen_geometry(&self) -> Geometry {
        Geometry::new(0, 0, self.screen.width, self.screen.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenSize {
        ScreenSize {
            width: 3840,
            height: 1080,
            width_mm: 1016,
            height_mm: 286,
        }
    }

    fn info(name: &str, x: i32, width_mm: u32, primary: bool) -> OutputInfo {
        OutputInfo {
            name: name.to_string(),
            geometry: Geometry::new(x, 0, 1920, 1080),
            width_mm,
            primary,
        }
    }

    fn dual() -> OutputTopology {
        let mut topology = OutputTopology::new(screen());
        topology.apply(&[info("HDMI-1", 1920, 508, true), info("eDP-1", 0, 254, false)]);
        topology
    }

    #[test]
    fn test_scale_from_dpi() {
        assert_eq!(scale_for(1920, 508), 1);
        assert_eq!(scale_for(1920, 254), 2);
        assert_eq!(scale_for(1920, 0), 1);
        assert_eq!(scale_for(800, 2000), 1);
    }

    #[test]
    fn test_outputs_ordered_with_primary() {
        let topology = dual();
        let names: Vec<_> = topology.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["eDP-1", "HDMI-1"]);
        assert_eq!(topology.primary().name, "HDMI-1");
        assert_eq!(topology.outputs()[0].scale, 2);
    }

    #[test]
    fn test_active_revalidated_on_refresh() {
        let mut topology = dual();
        topology.set_active_at(100, 100);
        assert_eq!(topology.active().name, "eDP-1");

        // eDP-1 unplugged: active falls back to primary
        assert!(topology.apply(&[info("HDMI-1", 1920, 508, true)]));
        assert_eq!(topology.active().name, "HDMI-1");
        assert!(!topology.apply(&[info("HDMI-1", 1920, 508, true)]));
    }

    #[test]
    fn test_mirrored_output_dropped() {
        let mut topology = OutputTopology::new(screen());
        topology.apply(&[info("A", 0, 508, true), info("B", 0, 508, false)]);
        assert_eq!(topology.outputs().len(), 1);
        assert_eq!(topology.outputs()[0].name, "A");
    }

    #[test]
    fn test_for_window_by_overlap() {
        let topology = dual();
        let window = Geometry::new(1800, 100, 400, 300);
        assert_eq!(topology.for_window(window).name, "HDMI-1");
        let offscreen = Geometry::new(5000, 5000, 10, 10);
        assert_eq!(topology.for_window(offscreen).name, "HDMI-1");
    }

    #[test]
    fn test_content_bounds_exclude_struts() {
        let mut topology = dual();
        assert!(topology.set_strut(
            0x42,
            Strut {
                left: 0,
                right: 0,
                top: 0,
                bottom: 40,
            }
        ));
        let hdmi = topology.outputs()[1].clone();
        assert_eq!(
            topology.content_bounds(&hdmi),
            Geometry::new(1920, 0, 1920, 1040)
        );
        assert_eq!(topology.work_area(), Geometry::new(0, 0, 3840, 1040));
        assert!(topology.remove_strut(0x42));
        assert_eq!(topology.content_bounds(&hdmi), hdmi.geometry());
    }
}
