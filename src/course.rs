use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grade band that decides which weekday grid a course follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortGroup {
    /// 1ro to 3ro.
    Junior,
    /// 4to to 6to.
    Middle,
    /// 7mo to IV Medio.
    Senior,
}

impl CohortGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CohortGroup::Junior => "junior",
            CohortGroup::Middle => "middle",
            CohortGroup::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cycle {
    Basic,
    Major,
}

impl Cycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cycle::Basic => "basic",
            Cycle::Major => "major",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Chromebook,
    Tablet,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 2] = [EquipmentType::Chromebook, EquipmentType::Tablet];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::Chromebook => "chromebook",
            EquipmentType::Tablet => "tablet",
        }
    }

    /// Number of physical carts of this type, numbered `1..=unit_count`.
    pub fn unit_count(&self) -> u8 {
        match self {
            EquipmentType::Chromebook => 10,
            EquipmentType::Tablet => 3,
        }
    }

    /// Most carts a single reservation may take within one block.
    pub fn max_units_per_block(&self) -> usize {
        match self {
            EquipmentType::Chromebook => 4,
            EquipmentType::Tablet => 3,
        }
    }

    pub fn units(&self) -> impl Iterator<Item = u8> {
        1..=self.unit_count()
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromebook" => Ok(EquipmentType::Chromebook),
            "tablet" => Ok(EquipmentType::Tablet),
            other => Err(format!("unknown equipment type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub cohort: CohortGroup,
    pub cycle: Cycle,
    pub equipment: EquipmentType,
}

impl Course {
    pub fn new(
        name: impl Into<String>,
        cohort: CohortGroup,
        cycle: Cycle,
        equipment: EquipmentType,
    ) -> Self {
        Self {
            name: name.into(),
            cohort,
            cycle,
            equipment,
        }
    }
}

const JUNIOR_COURSES: [&str; 8] = [
    "1ro A", "1ro B", "1ro C", "2do A", "2do B", "2do C", "3ro A", "3ro B",
];
const MIDDLE_COURSES: [&str; 6] = ["4to A", "4to B", "5to A", "5to B", "6to A", "6to B"];
const SENIOR_COURSES: [&str; 10] = [
    "7mo A",
    "7mo B",
    "8vo A",
    "8vo B",
    "I Medio A",
    "I Medio B",
    "II Medio A",
    "II Medio B",
    "III Medio A",
    "IV Medio A",
];
const TABLET_COURSES: [&str; 6] = ["1ro A", "1ro B", "1ro C", "2do A", "2do B", "2do C"];

/// The fixed school roster.
pub fn school_roster() -> Vec<Course> {
    let equipment_for = |name: &str| {
        if TABLET_COURSES.contains(&name) {
            EquipmentType::Tablet
        } else {
            EquipmentType::Chromebook
        }
    };

    let mut courses = Vec::with_capacity(
        JUNIOR_COURSES.len() + MIDDLE_COURSES.len() + SENIOR_COURSES.len(),
    );
    for name in JUNIOR_COURSES {
        courses.push(Course::new(
            name,
            CohortGroup::Junior,
            Cycle::Basic,
            equipment_for(name),
        ));
    }
    for name in MIDDLE_COURSES {
        courses.push(Course::new(
            name,
            CohortGroup::Middle,
            Cycle::Basic,
            equipment_for(name),
        ));
    }
    for name in SENIOR_COURSES {
        courses.push(Course::new(
            name,
            CohortGroup::Senior,
            Cycle::Major,
            equipment_for(name),
        ));
    }
    courses
}
