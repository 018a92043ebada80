//! Marker-id to corner-role binding table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical corner of the tracked surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Role {
    /// Roles in rectifier order (TL, TR, BL, BR).
    pub const ALL: [Role; 4] = [
        Role::TopLeft,
        Role::TopRight,
        Role::BottomLeft,
        Role::BottomRight,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Role::TopLeft => 0,
            Role::TopRight => 1,
            Role::BottomLeft => 2,
            Role::BottomRight => 3,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::TopLeft => "top-left",
            Role::TopRight => "top-right",
            Role::BottomLeft => "bottom-left",
            Role::BottomRight => "bottom-right",
        })
    }
}

/// Which point of a marker stands in for its role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerSelection {
    /// Corner at this index of `Marker::corners`.
    Corner(u8),
    /// Mean of all four corners.
    Centroid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub marker_id: u32,
    pub role: Role,
    pub selection: CornerSelection,
}

impl RoleBinding {
    pub const fn corner(marker_id: u32, role: Role, index: u8) -> Self {
        Self {
            marker_id,
            role,
            selection: CornerSelection::Corner(index),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("expected exactly 4 role bindings, got {got}")]
    WrongCount { got: usize },
    #[error("marker id {id} is bound more than once")]
    DuplicateMarker { id: u32 },
    #[error("role {role} is bound more than once")]
    DuplicateRole { role: Role },
    #[error("marker id {id}: corner index {index} is out of range (0..4)")]
    CornerOutOfRange { id: u32, index: u8 },
}

/// Validated one-to-one table of marker ids to roles, indexed by role.
///
/// Serializes as a plain list of [`RoleBinding`]s and is re-validated on
/// deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RoleBinding>", into = "Vec<RoleBinding>")]
pub struct BindingTable {
    by_role: [RoleBinding; 4],
}

impl BindingTable {
    pub fn new(bindings: Vec<RoleBinding>) -> Result<Self, BindingError> {
        if bindings.len() != 4 {
            return Err(BindingError::WrongCount {
                got: bindings.len(),
            });
        }

        let mut slots: [Option<RoleBinding>; 4] = [None; 4];
        for (i, b) in bindings.iter().enumerate() {
            if let CornerSelection::Corner(index) = b.selection {
                if index >= 4 {
                    return Err(BindingError::CornerOutOfRange {
                        id: b.marker_id,
                        index,
                    });
                }
            }
            if bindings[..i].iter().any(|o| o.marker_id == b.marker_id) {
                return Err(BindingError::DuplicateMarker { id: b.marker_id });
            }
            let slot = &mut slots[b.role.index()];
            if slot.is_some() {
                return Err(BindingError::DuplicateRole { role: b.role });
            }
            *slot = Some(*b);
        }

        // four bindings, four distinct roles: every slot is filled
        let mut by_role = [RoleBinding::corner(0, Role::TopLeft, 0); 4];
        for (dst, src) in by_role.iter_mut().zip(slots) {
            match src {
                Some(b) => *dst = b,
                None => return Err(BindingError::WrongCount { got: 4 }),
            }
        }
        Ok(Self { by_role })
    }

    /// Binding for the printed screen frame: 819 / 273 / 61 / 922, each using
    /// the marker corner that faces the inside of the surface.
    pub fn screen_frame() -> Self {
        Self {
            by_role: [
                RoleBinding::corner(819, Role::TopLeft, 2),
                RoleBinding::corner(273, Role::TopRight, 3),
                RoleBinding::corner(61, Role::BottomLeft, 1),
                RoleBinding::corner(922, Role::BottomRight, 0),
            ],
        }
    }

    /// Same ids, but every role uses the selection `sel`.
    pub fn with_selection(mut self, sel: CornerSelection) -> Result<Self, BindingError> {
        for b in &mut self.by_role {
            b.selection = sel;
        }
        Self::new(self.by_role.to_vec())
    }

    #[inline]
    pub fn binding(&self, role: Role) -> &RoleBinding {
        &self.by_role[role.index()]
    }

    /// Binding whose marker id is `id`, if any.
    pub fn for_marker(&self, id: u32) -> Option<&RoleBinding> {
        self.by_role.iter().find(|b| b.marker_id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleBinding> {
        self.by_role.iter()
    }
}

impl Default for BindingTable {
    fn default() -> Self {
        Self::screen_frame()
    }
}

impl TryFrom<Vec<RoleBinding>> for BindingTable {
    type Error = BindingError;

    fn try_from(value: Vec<RoleBinding>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BindingTable> for Vec<RoleBinding> {
    fn from(value: BindingTable) -> Self {
        value.by_role.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_screen_frame_ids() {
        let t = BindingTable::default();
        assert_eq!(t.binding(Role::TopLeft).marker_id, 819);
        assert_eq!(t.binding(Role::TopRight).marker_id, 273);
        assert_eq!(t.binding(Role::BottomLeft).marker_id, 61);
        assert_eq!(t.binding(Role::BottomRight).marker_id, 922);
        assert_eq!(
            t.for_marker(61).map(|b| b.selection),
            Some(CornerSelection::Corner(1))
        );
        assert!(t.for_marker(5).is_none());
    }

    #[test]
    fn table_is_indexed_by_role_regardless_of_input_order() {
        let t = BindingTable::new(vec![
            RoleBinding::corner(4, Role::BottomRight, 0),
            RoleBinding::corner(1, Role::TopLeft, 0),
            RoleBinding::corner(3, Role::BottomLeft, 0),
            RoleBinding::corner(2, Role::TopRight, 0),
        ])
        .expect("valid");
        let ids: Vec<u32> = t.iter().map(|b| b.marker_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn validation_rejects_bad_tables() {
        let base = BindingTable::default();
        let mut v: Vec<RoleBinding> = base.clone().into();

        assert_eq!(
            BindingTable::new(v[..3].to_vec()),
            Err(BindingError::WrongCount { got: 3 })
        );

        v[1].marker_id = 819;
        assert_eq!(
            BindingTable::new(v.clone()),
            Err(BindingError::DuplicateMarker { id: 819 })
        );

        let mut v: Vec<RoleBinding> = base.clone().into();
        v[3].role = Role::TopLeft;
        assert_eq!(
            BindingTable::new(v),
            Err(BindingError::DuplicateRole {
                role: Role::TopLeft
            })
        );

        let mut v: Vec<RoleBinding> = base.into();
        v[0].selection = CornerSelection::Corner(4);
        assert_eq!(
            BindingTable::new(v),
            Err(BindingError::CornerOutOfRange { id: 819, index: 4 })
        );
    }

    #[test]
    fn with_selection_switches_all_roles_to_centroid() {
        let t = BindingTable::default()
            .with_selection(CornerSelection::Centroid)
            .expect("valid");
        assert!(t.iter().all(|b| b.selection == CornerSelection::Centroid));
    }

    #[test]
    fn json_round_trip_revalidates() {
        let json = serde_json::to_string(&BindingTable::default()).expect("serialize");
        assert!(json.contains("\"top_left\""));
        assert!(json.contains("{\"corner\":2}"));
        let back: BindingTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, BindingTable::default());

        let bad = r#"[{"marker_id":1,"role":"top_left","selection":"centroid"}]"#;
        assert!(serde_json::from_str::<BindingTable>(bad).is_err());
    }
}
