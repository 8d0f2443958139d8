use crate::error::{Result, TeleopError};

/// Screen rectangle, closed on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl HitBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.x0 <= x && x <= self.x1 && self.y0 <= y && y <= self.y1
    }

    pub fn overlaps(&self, other: &HitBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    pub fn width(&self) -> u32 {
        self.x1.abs_diff(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.abs_diff(self.y0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleDef {
    pub name: String,
    pub label: String,
    pub hitbox: HitBox,
    pub default: bool,
}

impl ToggleDef {
    pub fn new(name: &str, label: &str, hitbox: HitBox) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
            hitbox,
            default: false,
        }
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Toggle {
    pub def: ToggleDef,
    pub value: bool,
}

/// Named on/off switches, kept in registration order, which is also the
/// order they are hit-tested and drawn in.
#[derive(Debug, Clone, Default)]
pub struct ToggleStore {
    toggles: Vec<Toggle>,
}

impl ToggleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: &[ToggleDef]) -> Result<Self> {
        let mut store = Self::new();
        for def in defs {
            store.register(def.clone())?;
        }
        Ok(store)
    }

    pub fn register(&mut self, def: ToggleDef) -> Result<()> {
        for t in &self.toggles {
            if t.def.name == def.name {
                return Err(TeleopError::InvalidToggle(format!(
                    "'{}' registered twice",
                    def.name
                )));
            }
            if t.def.hitbox.overlaps(&def.hitbox) {
                return Err(TeleopError::InvalidToggle(format!(
                    "hit-box of '{}' overlaps '{}'",
                    def.name, t.def.name
                )));
            }
        }
        let value = def.default;
        self.toggles.push(Toggle { def, value });
        Ok(())
    }

    /// Flips the first toggle whose hit-box contains the point and returns
    /// its name. Clicks outside every hit-box change nothing.
    pub fn on_click(&mut self, x: i32, y: i32) -> Option<&str> {
        let method_name = "on_click";
        let toggle = self
            .toggles
            .iter_mut()
            .find(|t| t.def.hitbox.contains(x, y))?;
        toggle.value = !toggle.value;
        tracing::info!(method_name, name = %toggle.def.name, value = toggle.value, "toggled");
        Some(toggle.def.name.as_str())
    }

    pub fn get(&self, name: &str) -> Result<bool> {
        self.find(name).map(|t| t.value)
    }

    pub fn set(&mut self, name: &str, value: bool) -> Result<()> {
        let toggle = self
            .toggles
            .iter_mut()
            .find(|t| t.def.name == name)
            .ok_or_else(|| TeleopError::ToggleNotFound(name.to_owned()))?;
        toggle.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toggle> {
        self.toggles.iter()
    }

    pub fn len(&self) -> usize {
        self.toggles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty()
    }

    fn find(&self, name: &str) -> Result<&Toggle> {
        self.toggles
            .iter()
            .find(|t| t.def.name == name)
            .ok_or_else(|| TeleopError::ToggleNotFound(name.to_owned()))
    }
}
