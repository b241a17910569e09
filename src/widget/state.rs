/// Distance from the bottom, in pixels, below which the view counts as "at the bottom".
pub const NEAR_BOTTOM_THRESHOLD: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Closed,
    Open,
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    Open,
    Close,
    Minimize,
    Restore,
    Toggle,
}

impl PanelState {
    /// Events that make no sense in the current state leave it unchanged.
    pub fn transition(self, event: PanelEvent) -> PanelState {
        use PanelEvent as E;
        use PanelState as S;
        match (self, event) {
            (S::Closed, E::Open) | (S::Closed, E::Toggle) => S::Open,
            (S::Open, E::Minimize) => S::Minimized,
            (S::Minimized, E::Restore) | (S::Minimized, E::Open) => S::Open,
            (S::Open, E::Close) | (S::Minimized, E::Close) => S::Closed,
            (S::Open, E::Toggle) | (S::Minimized, E::Toggle) => S::Closed,
            (state, _) => state,
        }
    }

    pub fn shows_messages(&self) -> bool {
        matches!(self, PanelState::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    pub fn is_near_bottom(&self) -> bool {
        self.distance_to_bottom() < NEAR_BOTTOM_THRESHOLD
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollState {
    auto_scrolling: bool,
    show_scroll_bottom: bool,
}

impl ScrollState {
    /// User scroll. Ignored while a programmatic scroll is running.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        if self.auto_scrolling {
            return;
        }
        self.show_scroll_bottom = !metrics.is_near_bottom();
    }

    pub fn begin_auto_scroll(&mut self) {
        self.auto_scrolling = true;
        self.show_scroll_bottom = false;
    }

    pub fn end_auto_scroll(&mut self) {
        self.auto_scrolling = false;
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.auto_scrolling
    }

    pub fn show_scroll_bottom(&self) -> bool {
        self.show_scroll_bottom
    }
}
