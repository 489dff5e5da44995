use std::ffi::c_void;

use super::features::{ATOM_CAPACITY_BYTES, HostFeatures, Lv2WorkerInterface, drain_worker};
use super::uris;
use crate::plugins::PluginInstance;
use lilv::instance::{ActiveInstance, Instance};
use lv2_raw::{LV2Atom, LV2AtomSequence, LV2AtomSequenceBody, LV2Urid};

/// Rounds of work served per block before leftovers wait for the next one.
const MAX_WORKER_ROUNDS: usize = 16;

struct AtomBuffer {
    words: Vec<u64>,
}

impl AtomBuffer {
    fn new(len_bytes: usize) -> Self {
        let words = len_bytes.div_ceil(std::mem::size_of::<u64>()).max(1);
        Self {
            words: vec![0; words],
        }
    }

    fn len_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    fn ptr_mut(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast::<u8>()
    }

    /// Empty sequence for the plugin to read.
    fn prepare_input(&mut self, sequence_urid: LV2Urid) {
        self.words.fill(0);
        let seq = self.ptr_mut() as *mut LV2AtomSequence;
        unsafe {
            (*seq).atom.mytype = sequence_urid;
            (*seq).atom.size = std::mem::size_of::<LV2AtomSequenceBody>() as u32;
        }
    }

    /// Chunk advertising the whole buffer for the plugin to write into.
    fn prepare_output(&mut self, chunk_urid: LV2Urid) {
        let capacity = self
            .len_bytes()
            .saturating_sub(std::mem::size_of::<LV2Atom>()) as u32;
        let atom = self.ptr_mut() as *mut LV2Atom;
        unsafe {
            (*atom).mytype = chunk_urid;
            (*atom).size = capacity;
        }
    }
}

struct AtomPort {
    index: usize,
    output: bool,
    buffer: AtomBuffer,
}

enum Slot {
    Inactive(Instance),
    Active(ActiveInstance),
    Released,
}

pub struct Lv2Instance {
    // Dropped before `features`, which the plugin holds pointers into.
    slot: Slot,
    atom_ports: Vec<AtomPort>,
    sequence_urid: LV2Urid,
    chunk_urid: LV2Urid,
    has_worker: bool,
    features: HostFeatures,
}

impl Lv2Instance {
    /// Wraps a fresh instance and binds its event ports to host buffers.
    /// `atom_ports` lists (port index, is output).
    pub(super) fn new(
        instance: Instance,
        atom_ports: &[(usize, bool)],
        sequence_urid: LV2Urid,
        chunk_urid: LV2Urid,
        has_worker: bool,
        features: HostFeatures,
    ) -> Self {
        let mut this = Self {
            slot: Slot::Inactive(instance),
            atom_ports: atom_ports
                .iter()
                .map(|&(index, output)| AtomPort {
                    index,
                    output,
                    buffer: AtomBuffer::new(ATOM_CAPACITY_BYTES),
                })
                .collect(),
            sequence_urid,
            chunk_urid,
            has_worker,
            features,
        };
        this.prepare_block();
        for n in 0..this.atom_ports.len() {
            let index = this.atom_ports[n].index;
            let ptr = this.atom_ports[n].buffer.ptr_mut();
            this.connect_raw(index, ptr.cast::<c_void>());
        }
        this
    }

    fn connect_raw(&mut self, port_index: usize, data: *mut c_void) {
        match &mut self.slot {
            Slot::Inactive(instance) => unsafe { instance.connect_port_mut(port_index, data) },
            Slot::Active(instance) => unsafe {
                instance.instance_mut().connect_port_mut(port_index, data)
            },
            Slot::Released => {}
        }
    }

    fn worker_interface(&self) -> Option<(&Lv2WorkerInterface, *mut c_void)> {
        let Slot::Active(instance) = &self.slot else {
            return None;
        };
        let ptr = unsafe {
            instance
                .instance()
                .extension_data::<Lv2WorkerInterface>(uris::WORKER_INTERFACE)?
        };
        let handle = instance.instance().handle() as *mut c_void;
        Some((unsafe { ptr.as_ref() }, handle))
    }
}

impl PluginInstance for Lv2Instance {
    fn activate(&mut self) {
        self.slot = match std::mem::replace(&mut self.slot, Slot::Released) {
            Slot::Inactive(instance) => Slot::Active(unsafe { instance.activate() }),
            other => other,
        };
    }

    fn deactivate(&mut self) {
        if let Slot::Active(instance) = std::mem::replace(&mut self.slot, Slot::Released) {
            let _ = unsafe { instance.deactivate() };
        }
    }

    unsafe fn connect_port(&mut self, port_index: usize, data: *mut f32) {
        self.connect_raw(port_index, data.cast::<c_void>());
    }

    fn prepare_block(&mut self) {
        for port in &mut self.atom_ports {
            if port.output {
                port.buffer.prepare_output(self.chunk_urid);
            } else {
                port.buffer.prepare_input(self.sequence_urid);
            }
        }
    }

    fn run(&mut self, frames: usize) {
        if let Slot::Active(instance) = &mut self.slot {
            unsafe {
                instance.run(frames);
            }
        }
    }

    fn run_deferred_work(&mut self) -> usize {
        if !self.has_worker {
            return 0;
        }
        let Some((interface, handle)) = self.worker_interface() else {
            return 0;
        };
        unsafe { drain_worker(interface, handle, self.features.worker(), MAX_WORKER_ROUNDS) }
    }
}

impl Drop for Lv2Instance {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urid::UridMap;

    #[test]
    fn input_sequence_is_empty() {
        let urids = UridMap::new();
        let sequence = urids.map(uris::ATOM_SEQUENCE);
        let mut buffer = AtomBuffer::new(ATOM_CAPACITY_BYTES);
        buffer.words[3] = u64::MAX;
        buffer.prepare_input(sequence);
        let seq = unsafe { &*(buffer.ptr_mut() as *const LV2AtomSequence) };
        assert_eq!(seq.atom.mytype, sequence);
        assert_eq!(seq.atom.size as usize, std::mem::size_of::<LV2AtomSequenceBody>());
        assert_eq!(seq.body.unit, 0);
        assert_eq!(buffer.words[3], 0);
    }

    #[test]
    fn output_chunk_advertises_capacity() {
        let urids = UridMap::new();
        let chunk = urids.map(uris::ATOM_CHUNK);
        let mut buffer = AtomBuffer::new(ATOM_CAPACITY_BYTES);
        buffer.prepare_output(chunk);
        let atom = unsafe { &*(buffer.ptr_mut() as *const LV2Atom) };
        assert_eq!(atom.mytype, chunk);
        assert_eq!(
            atom.size as usize,
            ATOM_CAPACITY_BYTES - std::mem::size_of::<LV2Atom>()
        );
    }
}
