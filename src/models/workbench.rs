use crate::models::Preferences;
use crate::services::mesh::PointCloud;
use indexmap::IndexMap;
use std::fmt;

/// The closed set of workbenches, in combo box order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkbenchKind {
    Control,
    Adjustment,
    Calibration,
    Scanning,
}

impl WorkbenchKind {
    pub const ALL: [WorkbenchKind; 4] = [
        WorkbenchKind::Control,
        WorkbenchKind::Adjustment,
        WorkbenchKind::Calibration,
        WorkbenchKind::Scanning,
    ];

    /// Workbench shown when the stored selection cannot be resolved
    pub const FALLBACK: WorkbenchKind = WorkbenchKind::Control;

    /// Key persisted in `preferences.workbench`
    pub fn key(&self) -> &'static str {
        match self {
            WorkbenchKind::Control => "control",
            WorkbenchKind::Adjustment => "adjustment",
            WorkbenchKind::Calibration => "calibration",
            WorkbenchKind::Scanning => "scanning",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkbenchKind::Control => "Control workbench",
            WorkbenchKind::Adjustment => "Adjustment workbench",
            WorkbenchKind::Calibration => "Calibration workbench",
            WorkbenchKind::Scanning => "Scanning workbench",
        }
    }

    /// Resolve a key or display name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| {
            kind.key().eq_ignore_ascii_case(name) || kind.display_name().eq_ignore_ascii_case(name)
        })
    }

    /// Resolve a persisted key, falling back to [`WorkbenchKind::FALLBACK`]
    pub fn from_stored(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            tracing::warn!(
                "Stored workbench {:?} is not valid, falling back to {}",
                name,
                Self::FALLBACK.key()
            );
            Self::FALLBACK
        })
    }
}

impl fmt::Display for WorkbenchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Arrangement of the scanning workbench's video/scene splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitLayout {
    VideoAndScene,
    VideoOnly,
    SceneOnly,
    Collapsed,
}

impl SplitLayout {
    pub fn from_flags(video: bool, scene: bool) -> Self {
        match (video, scene) {
            (true, true) => SplitLayout::VideoAndScene,
            (true, false) => SplitLayout::VideoOnly,
            (false, true) => SplitLayout::SceneOnly,
            (false, false) => SplitLayout::Collapsed,
        }
    }

    pub fn shows_video(&self) -> bool {
        matches!(self, SplitLayout::VideoAndScene | SplitLayout::VideoOnly)
    }

    pub fn shows_scene(&self) -> bool {
        matches!(self, SplitLayout::VideoAndScene | SplitLayout::SceneOnly)
    }
}

/// 3-D scene owned by the scanning workbench
#[derive(Debug, Clone)]
pub struct Scene {
    pub model: Option<PointCloud>,
    pub split: SplitLayout,
}

/// One workbench panel.
///
/// Workbenches are constructed once and live for the whole session; switching
/// only toggles visibility.
#[derive(Debug, Clone)]
pub struct Workbench {
    kind: WorkbenchKind,
    visible: bool,
    content_enabled: bool,
    connected: bool,
    status: bool,
    panel_visible: bool,
    video_visible: bool,
    controls_revision: u64,
    scene: Option<Scene>,
}

impl Workbench {
    pub fn new(kind: WorkbenchKind) -> Self {
        let scene = (kind == WorkbenchKind::Scanning).then(|| Scene {
            model: None,
            split: SplitLayout::SceneOnly,
        });

        Self {
            kind,
            visible: false,
            content_enabled: false,
            connected: false,
            status: false,
            panel_visible: true,
            video_visible: true,
            controls_revision: 0,
            scene,
        }
    }

    pub fn kind(&self) -> WorkbenchKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_content_enabled(&self) -> bool {
        self.content_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connection indicator shown in the workbench toolbar
    pub fn status(&self) -> bool {
        self.status
    }

    pub fn is_panel_visible(&self) -> bool {
        self.panel_visible
    }

    pub fn is_video_visible(&self) -> bool {
        self.video_visible
    }

    /// Number of times the controls were refreshed from the settings store
    pub fn controls_revision(&self) -> u64 {
        self.controls_revision
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn enable_content(&mut self) {
        self.content_enabled = true;
    }

    pub fn disable_content(&mut self) {
        self.content_enabled = false;
    }

    pub fn on_connect(&mut self) {
        self.connected = true;
        self.status = true;
    }

    pub fn on_disconnect(&mut self) {
        self.connected = false;
        self.status = false;
    }

    pub fn update_controls(&mut self) {
        self.controls_revision += 1;
        tracing::debug!("{} controls refreshed", self.kind);
    }

    pub fn set_status(&mut self, status: bool) {
        self.status = status;
    }

    pub fn set_panel_visible(&mut self, visible: bool) {
        self.panel_visible = visible;
    }

    pub fn set_video_visible(&mut self, visible: bool) {
        self.video_visible = visible;
    }

    /// Scanning only: rearrange the video/scene splitter
    pub fn set_split(&mut self, video: bool, scene: bool) {
        let split = SplitLayout::from_flags(video, scene);
        self.video_visible = split.shows_video();
        if let Some(s) = self.scene.as_mut() {
            s.split = split;
        }
    }

    pub fn model(&self) -> Option<&PointCloud> {
        self.scene.as_ref().and_then(|s| s.model.as_ref())
    }

    /// Scanning only: returns `false` if this workbench has no scene
    pub fn set_model(&mut self, model: PointCloud) -> bool {
        match self.scene.as_mut() {
            Some(scene) => {
                scene.model = Some(model);
                true
            }
            None => false,
        }
    }

    pub fn clear_model(&mut self) -> Option<PointCloud> {
        self.scene.as_mut().and_then(|s| s.model.take())
    }
}

/// All workbenches, exactly one of which is visible
#[derive(Debug, Clone)]
pub struct WorkbenchSet {
    benches: IndexMap<WorkbenchKind, Workbench>,
    active: WorkbenchKind,
    layout_revision: u64,
}

impl WorkbenchSet {
    pub fn new(initial: WorkbenchKind) -> Self {
        let benches = WorkbenchKind::ALL
            .into_iter()
            .map(|kind| (kind, Workbench::new(kind)))
            .collect();

        let mut set = Self {
            benches,
            active: initial,
            layout_revision: 0,
        };
        set.select(initial);
        set
    }

    /// Hide every workbench, then show `kind`
    pub fn select(&mut self, kind: WorkbenchKind) {
        for bench in self.benches.values_mut() {
            bench.hide();
        }
        self.get_mut(kind).show();
        self.active = kind;
        self.request_layout();
    }

    pub fn active(&self) -> WorkbenchKind {
        self.active
    }

    pub fn active_bench(&self) -> &Workbench {
        &self.benches[&self.active]
    }

    pub fn active_bench_mut(&mut self) -> &mut Workbench {
        let active = self.active;
        self.get_mut(active)
    }

    pub fn get(&self, kind: WorkbenchKind) -> &Workbench {
        &self.benches[&kind]
    }

    pub fn get_mut(&mut self, kind: WorkbenchKind) -> &mut Workbench {
        // Every kind is inserted in `new`
        self.benches
            .get_mut(&kind)
            .unwrap_or_else(|| unreachable!("workbench {kind} is always constructed"))
    }

    pub fn scanning(&self) -> &Workbench {
        self.get(WorkbenchKind::Scanning)
    }

    pub fn scanning_mut(&mut self) -> &mut Workbench {
        self.get_mut(WorkbenchKind::Scanning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workbench> {
        self.benches.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Workbench> {
        self.benches.values_mut()
    }

    pub fn visible_count(&self) -> usize {
        self.iter().filter(|b| b.is_visible()).count()
    }

    pub fn layout_revision(&self) -> u64 {
        self.layout_revision
    }

    pub fn request_layout(&mut self) {
        self.layout_revision += 1;
    }

    /// Apply the persisted View menu flags to the panels
    pub fn apply_view_preferences(&mut self, prefs: &Preferences) {
        let panels = [
            (WorkbenchKind::Control, prefs.view_control_panel, prefs.view_control_video),
            (WorkbenchKind::Adjustment, prefs.view_adjustment_panel, prefs.view_adjustment_video),
            (WorkbenchKind::Calibration, prefs.view_calibration_panel, prefs.view_calibration_video),
        ];
        for (kind, panel, video) in panels {
            let bench = self.get_mut(kind);
            bench.set_panel_visible(panel);
            bench.set_video_visible(video);
        }

        let scanning = self.scanning_mut();
        scanning.set_panel_visible(prefs.view_scanning_panel);
        scanning.set_split(prefs.view_scanning_video, prefs.view_scanning_scene);

        self.request_layout();
    }
}
