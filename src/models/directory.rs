//! Reference data: departments, lecturers and rooms.
//!
//! The directory is a read-only snapshot supplied by the caller. The
//! engine uses it to reject sessions that reference unknown entities and
//! to look for alternative rooms when suggesting resolutions. Managing the
//! directory itself happens elsewhere.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An academic department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    /// Unique department identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Timetable colour (e.g. `"#3b82f6"`).
    pub color: String,
}

/// A lecturer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecturer {
    /// Unique lecturer identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Home department.
    pub department_id: String,
    /// Optional area of expertise.
    pub specialization: Option<String>,
}

/// A bookable room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Room name, unique on campus (e.g. `"CS-101"`).
    pub name: String,
    /// Seats.
    pub capacity: u32,
}

impl Department {
    /// Creates a department.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
        }
    }

    /// Sets the timetable colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

impl Lecturer {
    /// Creates a lecturer.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        department_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department_id: department_id.into(),
            specialization: None,
        }
    }

    /// Sets the specialization.
    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }
}

impl Room {
    /// Creates a room.
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Snapshot of known departments, lecturers and rooms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    departments: HashMap<String, Department>,
    lecturers: HashMap<String, Lecturer>,
    rooms: HashMap<String, Room>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a department.
    pub fn with_department(mut self, department: Department) -> Self {
        self.departments.insert(department.id.clone(), department);
        self
    }

    /// Adds a lecturer.
    pub fn with_lecturer(mut self, lecturer: Lecturer) -> Self {
        self.lecturers.insert(lecturer.id.clone(), lecturer);
        self
    }

    /// Adds a room.
    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.insert(room.name.clone(), room);
        self
    }

    pub fn department(&self, id: &str) -> Option<&Department> {
        self.departments.get(id)
    }

    pub fn lecturer(&self, id: &str) -> Option<&Lecturer> {
        self.lecturers.get(id)
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Rooms seating at least `min_capacity`, smallest first, then by name.
    pub fn rooms_with_capacity(&self, min_capacity: u32) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self
            .rooms
            .values()
            .filter(|r| r.capacity >= min_capacity)
            .collect();
        rooms.sort_by(|a, b| a.capacity.cmp(&b.capacity).then_with(|| a.name.cmp(&b.name)));
        rooms
    }

    /// Lecturers of a department, by id.
    pub fn lecturers_in(&self, department_id: &str) -> Vec<&Lecturer> {
        let mut lecturers: Vec<&Lecturer> = self
            .lecturers
            .values()
            .filter(|l| l.department_id == department_id)
            .collect();
        lecturers.sort_by(|a, b| a.id.cmp(&b.id));
        lecturers
    }

    /// Number of rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
