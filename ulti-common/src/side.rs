use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    ops::{Index, IndexMut},
    str::FromStr,
};

/// Which of the two teams a score or setting is addressed to. The side letter
/// is boundary-only addressing; recorded points always carry the resolved
/// team name.
#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Side {
    #[derivative(Default)]
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "a" | "A" => Ok(Self::A),
            "b" | "B" => Ok(Self::B),
            other => Err(format!("Unknown side: {other}")),
        }
    }
}

#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, PartialEq, Eq)]
pub struct SideBundle<T> {
    pub a: T,
    pub b: T,
}

impl<T> SideBundle<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        self.into_iter()
    }
}

impl<T> Index<Side> for SideBundle<T> {
    type Output = T;

    fn index(&self, side: Side) -> &Self::Output {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}

impl<T> IndexMut<Side> for SideBundle<T> {
    fn index_mut(&mut self, side: Side) -> &mut Self::Output {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

impl<T: Display> Display for SideBundle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "A: {}, B: {}", self.a, self.b)
    }
}

pub struct SideBundleIterator<'a, T> {
    bundle: &'a SideBundle<T>,
    index: usize,
}

impl<'a, T> Iterator for SideBundleIterator<'a, T> {
    type Item = (Side, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.index {
            0 => (Side::A, &self.bundle.a),
            1 => (Side::B, &self.bundle.b),
            _ => return None,
        };

        self.index += 1;
        Some(value)
    }
}

impl<'a, T> IntoIterator for &'a SideBundle<T> {
    type Item = (Side, &'a T);
    type IntoIter = SideBundleIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        SideBundleIterator {
            bundle: self,
            index: 0,
        }
    }
}
