//! Fixed-capacity collection of the bench's sensor drivers

use heapless::Vec;

use crate::sensor::{SensorDriver, SensorId};

/// Maximum number of sensors on one bench
pub const MAX_SENSORS: usize = 8;

/// Registration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Already holding [`MAX_SENSORS`] drivers
    Full,
    /// A driver for this id is already registered
    Duplicate(SensorId),
}

/// Sensor drivers in registration order
///
/// Drivers are borrowed, not owned: the firmware keeps them in `main`'s
/// frame for the life of the program and host tests keep them on the stack.
pub struct SensorRegistry<'a> {
    sensors: Vec<&'a mut dyn SensorDriver, MAX_SENSORS>,
}

impl<'a> SensorRegistry<'a> {
    pub const fn new() -> Self {
        Self { sensors: Vec::new() }
    }

    /// Add a driver; ids must be unique
    pub fn register(&mut self, driver: &'a mut dyn SensorDriver) -> Result<(), RegistryError> {
        let id = driver.id();
        if self.contains(id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.sensors.push(driver).map_err(|_| RegistryError::Full)?;
        debug!("Registered sensor {}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: SensorId) -> Option<usize> {
        self.sensors.iter().position(|s| s.id() == id)
    }

    pub fn get(&self, index: usize) -> Option<&(dyn SensorDriver + 'a)> {
        self.sensors.get(index).map(|s| &**s)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn SensorDriver + 'a)> {
        self.sensors.get_mut(index).map(|s| &mut **s)
    }

    pub fn by_id(&self, id: SensorId) -> Option<&(dyn SensorDriver + 'a)> {
        self.get(self.index_of(id)?)
    }

    pub fn by_id_mut(&mut self, id: SensorId) -> Option<&mut (dyn SensorDriver + 'a)> {
        let index = self.index_of(id)?;
        self.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn SensorDriver + 'a)> + '_ {
        self.sensors.iter().map(|s| &**s)
    }
}

impl Default for SensorRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}
