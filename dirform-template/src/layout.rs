//! Layout strategies and child placement.

use crate::property::Rect;
use crate::xml::XmlElement;

/// How a container arranges its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Grid,
    Horizontal,
    Vertical,
    /// Two-column label/field form.
    Form,
    /// Absolute positioning from each child's geometry.
    Canvas,
}

impl LayoutKind {
    /// Maps a descriptor layout class; `None` for unknown classes.
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "QGridLayout" => Some(Self::Grid),
            "QHBoxLayout" => Some(Self::Horizontal),
            "QVBoxLayout" => Some(Self::Vertical),
            "QFormLayout" => Some(Self::Form),
            _ => None,
        }
    }

    pub fn is_box(&self) -> bool {
        matches!(self, Self::Horizontal | Self::Vertical)
    }
}

/// Size policy of one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizePolicyKind {
    Fixed,
    Ignored,
    Minimum,
    Maximum,
    #[default]
    Preferred,
    Expanding,
    MinimumExpanding,
}

impl SizePolicyKind {
    /// Accepts both `Expanding` and `QSizePolicy::Expanding`.
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.rsplit("::").next().unwrap_or(s);
        match name {
            "Fixed" => Some(Self::Fixed),
            "Ignored" => Some(Self::Ignored),
            "Minimum" => Some(Self::Minimum),
            "Maximum" => Some(Self::Maximum),
            "Preferred" => Some(Self::Preferred),
            "Expanding" => Some(Self::Expanding),
            "MinimumExpanding" => Some(Self::MinimumExpanding),
            _ => None,
        }
    }

    /// Flex weight a box layout assigns to this policy.
    pub fn flex(&self) -> u32 {
        match self {
            Self::Fixed | Self::Ignored | Self::Minimum => 0,
            Self::Maximum => 10,
            Self::Preferred => 1,
            Self::Expanding => 4,
            Self::MinimumExpanding => 2,
        }
    }
}

/// Two-axis size policy with optional stretch factors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizePolicy {
    pub horizontal: SizePolicyKind,
    pub vertical: SizePolicyKind,
    pub hor_stretch: u32,
    pub ver_stretch: u32,
}

impl SizePolicy {
    pub(crate) fn from_element(element: &XmlElement) -> Self {
        let kind = |key: &str| {
            element
                .attr(key)
                .and_then(SizePolicyKind::parse)
                .unwrap_or_default()
        };
        let stretch = |key: &str| {
            element
                .child_text(key)
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or(0)
        };
        Self {
            horizontal: kind("hsizetype"),
            vertical: kind("vsizetype"),
            hor_stretch: stretch("horstretch"),
            ver_stretch: stretch("verstretch"),
        }
    }

    /// Flex weight along the main axis of a box layout. A non-zero stretch
    /// overrides the policy table.
    pub fn flex(&self, layout: LayoutKind) -> u32 {
        let (kind, stretch) = match layout {
            LayoutKind::Horizontal => (self.horizontal, self.hor_stretch),
            _ => (self.vertical, self.ver_stretch),
        };
        if stretch > 0 { stretch } else { kind.flex() }
    }
}

/// Column role of an item in a form layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRole {
    Label,
    Field,
    Spanning,
}

/// Where a child sits inside its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Placement {
    /// Top of the tree, or a child of a container without layout.
    #[default]
    Root,
    Grid {
        row: u32,
        column: u32,
        rowspan: u32,
        colspan: u32,
    },
    Box {
        index: usize,
        flex: u32,
    },
    Form {
        row: u32,
        role: FormRole,
    },
    /// Page of a tab widget.
    Page {
        index: usize,
    },
    Absolute(Rect),
}
