// MIDI device enumeration

use crate::error::Result;
use midir::{MidiInput as MidirInput, MidiOutput as MidirOutput};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

pub struct MidiDeviceManager {
    client_name: String,
}

impl MidiDeviceManager {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    /// List every MIDI input port
    pub fn list_input_ports(&self) -> Result<Vec<MidiDeviceInfo>> {
        let midi_in = MidirInput::new(&format!("{} Scanner", self.client_name))?;
        let names = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();

        Ok(describe_ports("midi_in", names))
    }

    /// List every MIDI output port
    pub fn list_output_ports(&self) -> Result<Vec<MidiDeviceInfo>> {
        let midi_out = MidirOutput::new(&format!("{} Scanner", self.client_name))?;
        let names = midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect();

        Ok(describe_ports("midi_out", names))
    }

    /// Name of the first input port, if any
    pub fn default_input_name(&self) -> Result<Option<String>> {
        Ok(self.list_input_ports()?.into_iter().next().map(|d| d.name))
    }

    /// Name of the first output port, if any
    pub fn default_output_name(&self) -> Result<Option<String>> {
        Ok(self.list_output_ports()?.into_iter().next().map(|d| d.name))
    }
}

/// The first port is considered the default
fn describe_ports(prefix: &str, names: Vec<String>) -> Vec<MidiDeviceInfo> {
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| MidiDeviceInfo {
            id: format!("{}_{}", prefix, index),
            name,
            is_default: index == 0,
        })
        .collect()
}
