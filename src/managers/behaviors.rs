//! Behavior collection operations.

use zmk_layout_models::{
    ComboBehavior, HoldTapBehavior, LayoutData, LayoutError, MacroBehavior, Result,
    TapDanceBehavior,
};

/// A read-only view of one behavior, whichever collection it lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorRef<'a> {
    HoldTap(&'a HoldTapBehavior),
    Combo(&'a ComboBehavior),
    Macro(&'a MacroBehavior),
    TapDance(&'a TapDanceBehavior),
}

impl BehaviorRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            BehaviorRef::HoldTap(b) => &b.name,
            BehaviorRef::Combo(b) => &b.name,
            BehaviorRef::Macro(b) => &b.name,
            BehaviorRef::TapDance(b) => &b.name,
        }
    }
}

pub struct BehaviorManager<'a> {
    data: &'a mut LayoutData,
}

impl<'a> BehaviorManager<'a> {
    pub(crate) fn new(data: &'a mut LayoutData) -> Self {
        Self { data }
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.find(name).is_some() {
            return Err(LayoutError::BehaviorExists(name.to_owned()));
        }
        Ok(())
    }

    /// Add a hold-tap; it must have exactly two bindings.
    pub fn add_hold_tap(&mut self, hold_tap: HoldTapBehavior) -> Result<&mut Self> {
        if hold_tap.bindings.len() != 2 {
            return Err(LayoutError::HoldTapArity {
                name: hold_tap.name.clone(),
                got: hold_tap.bindings.len(),
            });
        }
        self.check_unique(&hold_tap.name)?;
        self.data.hold_taps.push(hold_tap);
        Ok(self)
    }

    /// Add a combo; it must cover at least one key position.
    pub fn add_combo(&mut self, combo: ComboBehavior) -> Result<&mut Self> {
        if combo.key_positions.is_empty() {
            return Err(LayoutError::EmptyComboPositions(combo.name.clone()));
        }
        self.check_unique(&combo.name)?;
        self.data.combos.push(combo);
        Ok(self)
    }

    pub fn add_macro(&mut self, mac: MacroBehavior) -> Result<&mut Self> {
        self.check_unique(&mac.name)?;
        self.data.macros.push(mac);
        Ok(self)
    }

    /// Add a tap-dance; it needs at least two bindings.
    pub fn add_tap_dance(&mut self, tap_dance: TapDanceBehavior) -> Result<&mut Self> {
        if tap_dance.bindings.len() < 2 {
            return Err(LayoutError::TapDanceArity {
                name: tap_dance.name.clone(),
                got: tap_dance.bindings.len(),
            });
        }
        self.check_unique(&tap_dance.name)?;
        self.data.tap_dances.push(tap_dance);
        Ok(self)
    }

    /// Remove a behavior from whichever collection holds it.
    pub fn remove_by_name(&mut self, name: &str) -> Result<&mut Self> {
        let hold_taps = self.data.hold_taps.len();
        self.data.hold_taps.retain(|b| b.name != name);
        if self.data.hold_taps.len() != hold_taps {
            return Ok(self);
        }
        let combos = self.data.combos.len();
        self.data.combos.retain(|b| b.name != name);
        if self.data.combos.len() != combos {
            return Ok(self);
        }
        let macros = self.data.macros.len();
        self.data.macros.retain(|b| b.name != name);
        if self.data.macros.len() != macros {
            return Ok(self);
        }
        let tap_dances = self.data.tap_dances.len();
        self.data.tap_dances.retain(|b| b.name != name);
        if self.data.tap_dances.len() != tap_dances {
            return Ok(self);
        }
        Err(LayoutError::BehaviorNotFound(name.to_owned()))
    }

    pub fn find(&self, name: &str) -> Option<BehaviorRef<'_>> {
        if let Some(b) = self.data.hold_taps.iter().find(|b| b.name == name) {
            return Some(BehaviorRef::HoldTap(b));
        }
        if let Some(b) = self.data.combos.iter().find(|b| b.name == name) {
            return Some(BehaviorRef::Combo(b));
        }
        if let Some(b) = self.data.macros.iter().find(|b| b.name == name) {
            return Some(BehaviorRef::Macro(b));
        }
        if let Some(b) = self.data.tap_dances.iter().find(|b| b.name == name) {
            return Some(BehaviorRef::TapDance(b));
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn hold_tap_count(&self) -> usize {
        self.data.hold_taps.len()
    }

    pub fn combo_count(&self) -> usize {
        self.data.combos.len()
    }

    pub fn macro_count(&self) -> usize {
        self.data.macros.len()
    }

    pub fn tap_dance_count(&self) -> usize {
        self.data.tap_dances.len()
    }

    pub fn total_count(&self) -> usize {
        self.hold_tap_count() + self.combo_count() + self.macro_count() + self.tap_dance_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zmk_layout_models::LayoutBinding;

    fn data() -> LayoutData {
        LayoutData::new("kb", "t")
    }

    fn hold_tap(name: &str) -> HoldTapBehavior {
        HoldTapBehavior {
            name: name.into(),
            bindings: vec!["&kp".into(), "&mo".into()],
            ..Default::default()
        }
    }

    #[test]
    fn hold_tap_arity_enforced() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        let mut bad = hold_tap("bad");
        bad.bindings.pop();
        assert!(matches!(
            mgr.add_hold_tap(bad),
            Err(LayoutError::HoldTapArity { got: 1, .. })
        ));
        assert_eq!(mgr.hold_tap_count(), 0);
        mgr.add_hold_tap(hold_tap("hm")).unwrap();
        assert_eq!(mgr.hold_tap_count(), 1);
    }

    #[test]
    fn names_unique_across_collections() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        mgr.add_hold_tap(hold_tap("x")).unwrap();
        let mac = MacroBehavior {
            name: "x".into(),
            ..Default::default()
        };
        assert!(matches!(
            mgr.add_macro(mac),
            Err(LayoutError::BehaviorExists(_))
        ));
    }

    #[test]
    fn combo_needs_positions() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        let combo = ComboBehavior {
            name: "c".into(),
            description: None,
            key_positions: vec![],
            binding: LayoutBinding::from_str("&kp ESC").unwrap(),
            timeout_ms: None,
            layers: None,
            require_prior_idle_ms: None,
        };
        assert!(matches!(
            mgr.add_combo(combo),
            Err(LayoutError::EmptyComboPositions(_))
        ));
    }

    #[test]
    fn tap_dance_needs_two_bindings() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        let td = TapDanceBehavior {
            name: "td".into(),
            bindings: vec![LayoutBinding::from_str("&kp Q").unwrap()],
            ..Default::default()
        };
        assert!(matches!(
            mgr.add_tap_dance(td),
            Err(LayoutError::TapDanceArity { got: 1, .. })
        ));
    }

    #[test]
    fn remove_by_name_searches_all_collections() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        mgr.add_hold_tap(hold_tap("hm")).unwrap();
        mgr.add_macro(MacroBehavior {
            name: "email".into(),
            bindings: vec![LayoutBinding::from_str("&kp E").unwrap()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(mgr.total_count(), 2);
        mgr.remove_by_name("email").unwrap();
        assert_eq!(mgr.total_count(), 1);
        assert!(matches!(
            mgr.remove_by_name("email"),
            Err(LayoutError::BehaviorNotFound(_))
        ));
    }

    #[test]
    fn find_reports_kind() {
        let mut data = data();
        let mut mgr = BehaviorManager::new(&mut data);
        mgr.add_hold_tap(hold_tap("hm")).unwrap();
        match mgr.find("hm") {
            Some(BehaviorRef::HoldTap(b)) => assert_eq!(b.name, "hm"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(mgr.find("missing").is_none());
    }
}
