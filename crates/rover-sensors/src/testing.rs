use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use nalgebra::{Unit, Vector3};
use rover_core::error::{Error, Result};
use rover_core::frames::EnginePose;
use rover_core::world::World;

pub(crate) enum Rays {
    Miss,
    /// The n-th cast (from 1) hits at distance n.
    Counting(Cell<u32>),
}

pub(crate) struct MockWorld {
    pub links: HashMap<String, EnginePose>,
    pub rays: Rays,
    pub casts: RefCell<Vec<(Vector3<f64>, Vector3<f64>, f64)>>,
}

impl MockWorld {
    pub fn new(rays: Rays) -> Self {
        let mut links = HashMap::new();
        links.insert("base_link".to_string(), EnginePose::identity());
        MockWorld {
            links,
            rays,
            casts: RefCell::new(Vec::new()),
        }
    }

    pub fn set_pose(&mut self, pose: EnginePose) {
        self.links.insert("base_link".to_string(), pose);
    }
}

impl World for MockWorld {
    fn link_pose(&self, link: &str) -> Result<EnginePose> {
        self.links
            .get(link)
            .copied()
            .ok_or_else(|| Error::unavailable(format!("link '{}' not found", link)))
    }

    fn raycast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<f64> {
        self.casts
            .borrow_mut()
            .push((*origin, direction.into_inner(), max_distance));
        match &self.rays {
            Rays::Miss => None,
            Rays::Counting(n) => {
                n.set(n.get() + 1);
                Some(n.get() as f64)
            }
        }
    }
}
