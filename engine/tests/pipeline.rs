use std::path::Path;

use approx::assert_relative_eq;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use lv2file_engine::{
    ApplyJob, Error, PluginFactory, PluginInstance, PortInfo, PortKind, PortLayout,
    ProcessOptions, Result, apply,
};

/// Stereo-capable echo: output `n` copies input `n` scaled by `gain`.
struct Echo {
    layout: PortLayout,
}

impl Echo {
    fn new(ports: usize) -> Self {
        let mut infos = vec![];
        for n in 0..ports {
            infos.push(PortInfo::new(infos.len(), &format!("in{n}"), PortKind::AudioInput));
        }
        for n in 0..ports {
            infos.push(PortInfo::new(infos.len(), &format!("out{n}"), PortKind::AudioOutput));
        }
        let mut gain = PortInfo::new(infos.len(), "gain", PortKind::ControlInput);
        gain.default = Some(1.0);
        infos.push(gain);
        Self {
            layout: PortLayout::new(infos),
        }
    }
}

struct EchoInstance {
    ports: Vec<*mut f32>,
    pairs: usize,
}

impl PluginInstance for EchoInstance {
    fn activate(&mut self) {}

    fn deactivate(&mut self) {}

    unsafe fn connect_port(&mut self, port_index: usize, data: *mut f32) {
        self.ports[port_index] = data;
    }

    fn run(&mut self, frames: usize) {
        unsafe {
            let gain = *self.ports[2 * self.pairs];
            for n in 0..self.pairs {
                let input = self.ports[n];
                let output = self.ports[self.pairs + n];
                for i in 0..frames {
                    *output.add(i) = *input.add(i) * gain;
                }
            }
        }
    }
}

impl PluginFactory for Echo {
    fn uri(&self) -> &str {
        "urn:lv2file:test:echo"
    }

    fn ports(&self) -> &PortLayout {
        &self.layout
    }

    fn instantiate(&self, _sample_rate: f64, _block_size: usize) -> Result<Box<dyn PluginInstance>> {
        Ok(Box::new(EchoInstance {
            ports: vec![std::ptr::null_mut(); self.layout.ports().len()],
            pairs: self.layout.audio_input_count(),
        }))
    }
}

fn float_spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: 44_100,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn write_wav(path: &Path, spec: WavSpec, samples: &[f32]) {
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        match spec.sample_format {
            SampleFormat::Float => writer.write_sample(sample).unwrap(),
            SampleFormat::Int => writer
                .write_sample((sample * 32_768.0).round() as i16)
                .unwrap(),
        }
    }
    writer.finalize().unwrap();
}

fn read_floats(path: &Path) -> (WavSpec, Vec<f32>) {
    let mut reader = WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().map(|s| s.unwrap()).collect(),
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.unwrap() as f32 / 32_768.0)
            .collect(),
    };
    (spec, samples)
}

fn job(dir: &Path, block_size: usize) -> ApplyJob {
    ApplyJob {
        input: dir.join("in.wav"),
        output: dir.join("out.wav"),
        options: ProcessOptions {
            block_size,
            check_clipping: true,
        },
        ..ApplyJob::default()
    }
}

#[test]
fn identity_routing_reproduces_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 64);
    let samples: Vec<f32> = (0..1000).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
    write_wav(&job.input, float_spec(2), &samples);

    let summary = apply(&Echo::new(2), &job).unwrap();
    assert_eq!(summary.instances, 1);
    assert_eq!(summary.run.frames, 500);

    let (spec, output) = read_floats(&job.output);
    assert_eq!(spec, float_spec(2));
    assert_eq!(output, samples);
}

#[test]
fn partial_last_block_keeps_the_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 512);
    let samples = vec![0.25_f32; 1300];
    write_wav(&job.input, float_spec(1), &samples);

    let summary = apply(&Echo::new(1), &job).unwrap();
    assert_eq!(summary.run.blocks, 3);
    let (_, output) = read_floats(&job.output);
    assert_eq!(output.len(), 1300);
}

#[test]
fn mono_plugin_runs_once_per_channel() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 16);
    job.controls = vec!["gain:0.5".into()];
    let samples = vec![0.2, -0.4, 0.6, -0.8];
    write_wav(&job.input, float_spec(2), &samples);

    let summary = apply(&Echo::new(1), &job).unwrap();
    assert_eq!(summary.instances, 2);
    assert_eq!(summary.output_channels, 2);
    let (_, output) = read_floats(&job.output);
    for (out, input) in output.iter().zip(&samples) {
        assert_relative_eq!(*out, input * 0.5);
    }
}

#[test]
fn integer_input_produces_integer_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 8);
    job.controls = vec!["gain:4".into()];
    let spec = WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    write_wav(&job.input, spec, &[0.125, 0.5, -0.5]);

    let summary = apply(&Echo::new(1), &job).unwrap();
    assert_eq!(summary.run.first_clipped_block, Some(0));
    let (out_spec, output) = read_floats(&job.output);
    assert_eq!(out_spec, spec);
    assert_relative_eq!(output[0], 0.5);
    assert_relative_eq!(output[1], 32_767.0 / 32_768.0);
    assert_relative_eq!(output[2], -1.0);
}

#[test]
fn routing_errors_leave_no_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 8);
    write_wav(&job.input, float_spec(1), &[0.0; 4]);

    job.connections = vec!["2:in0".into()];
    assert!(matches!(
        apply(&Echo::new(1), &job),
        Err(Error::ChannelOutOfRange { channel: 2, .. })
    ));
    assert!(!job.output.exists());

    job.connections = vec![];
    assert!(matches!(
        apply(&Echo::new(2), &job),
        Err(Error::InsufficientChannels { .. })
    ));
    assert!(!job.output.exists());
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let job = job(dir.path(), 8);
    assert!(matches!(
        apply(&Echo::new(1), &job),
        Err(Error::FileIo { .. })
    ));
}

#[test]
fn arguments_are_checked_before_the_input_is_opened() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 8);
    job.connections = vec!["1:in0.x".into()];
    assert!(matches!(
        apply(&Echo::new(1), &job),
        Err(Error::MalformedRoutingRule { .. })
    ));
}

#[test]
fn misspelled_port_still_processes() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 8);
    job.connections = vec!["1:in-0,1:in0".into()];
    write_wav(&job.input, float_spec(1), &[0.5, -0.5]);

    let summary = apply(&Echo::new(1), &job).unwrap();
    assert_eq!(summary.unknown_ports, vec!["in-0".to_string()]);
    let (_, output) = read_floats(&job.output);
    assert_eq!(output, vec![0.5, -0.5]);
}

#[test]
fn non_wav_input_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job(dir.path(), 32);
    job.input = dir.path().join("in.audio");
    let spec = WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let samples: Vec<f32> = (0..200).map(|i| ((i % 16) as f32 - 8.0) / 16.0).collect();
    write_wav(&job.input, spec, &samples);

    let summary = apply(&Echo::new(2), &job).unwrap();
    assert_eq!(summary.run.frames, 100);
    let (out_spec, output) = read_floats(&job.output);
    assert_eq!(out_spec, spec);
    assert_eq!(output, samples);
}
