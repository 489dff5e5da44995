use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

/// Source of interleaved float frames.
pub trait FrameReader {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Fills `buffer` with whole frames, returning how many were read.
    /// Zero means the input is exhausted.
    fn read_frames(&mut self, buffer: &mut [f32]) -> Result<usize>;
}

/// Sink for interleaved float frames.
pub trait FrameWriter {
    fn channels(&self) -> usize;

    fn write_frames(&mut self, samples: &[f32]) -> Result<()>;

    /// Flushes headers and buffered data. Writing after this is an error.
    fn finish(&mut self) -> Result<()>;
}

pub struct WavFrameReader {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
}

impl WavFrameReader {
    pub fn open(path: &Path) -> Result<Self> {
        let reader =
            WavReader::open(path).map_err(|e| Error::file_io("open input file", path, e))?;
        let spec = reader.spec();
        if spec.sample_format == SampleFormat::Float && spec.bits_per_sample != 32 {
            return Err(Error::file_io(
                "read input file",
                path,
                format!("unsupported float width {}", spec.bits_per_sample),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.reader.spec()
    }

    /// Frames in the file, as declared by its header.
    pub fn frames(&self) -> u32 {
        self.reader.duration()
    }
}

impl FrameReader for WavFrameReader {
    fn channels(&self) -> usize {
        usize::from(self.reader.spec().channels)
    }

    fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let spec = self.reader.spec();
        let channels = usize::from(spec.channels).max(1);
        let wanted = buffer.len() / channels * channels;
        let mut read = 0;
        match spec.sample_format {
            SampleFormat::Float => {
                for (slot, sample) in buffer[..wanted]
                    .iter_mut()
                    .zip(self.reader.samples::<f32>())
                {
                    *slot = sample.map_err(|e| Error::file_io("read input file", &self.path, e))?;
                    read += 1;
                }
            }
            SampleFormat::Int => {
                let scale = int_scale(spec.bits_per_sample);
                for (slot, sample) in buffer[..wanted]
                    .iter_mut()
                    .zip(self.reader.samples::<i32>())
                {
                    let sample =
                        sample.map_err(|e| Error::file_io("read input file", &self.path, e))?;
                    *slot = sample as f32 / scale;
                    read += 1;
                }
            }
        }
        Ok(read / channels)
    }
}

/// An opened input, WAV through hound and everything else through symphonia.
pub enum InputFile {
    Wav(WavFrameReader),
    Decoded(DecodedFrameReader),
}

impl InputFile {
    pub fn open(path: &Path) -> Result<Self> {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"));
        if is_wav {
            WavFrameReader::open(path).map(Self::Wav)
        } else {
            DecodedFrameReader::open(path).map(Self::Decoded)
        }
    }
}

/// Streams any container and codec symphonia knows, one packet at a time.
pub struct DecodedFrameReader {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    sample_rate: u32,
    bits_per_sample: Option<u32>,
    pending: Vec<f32>,
    offset: usize,
    exhausted: bool,
}

impl DecodedFrameReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::file_io("open input file", path, e))?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::file_io("open input file", path, e))?;
        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| Error::file_io("open input file", path, "no decodable audio track"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::file_io("open input file", path, e))?;

        let mut reader = Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            channels: params.channels.map(|c| c.count()).unwrap_or(0),
            sample_rate: params.sample_rate.unwrap_or(0),
            bits_per_sample: params.bits_per_sample,
            pending: vec![],
            offset: 0,
            exhausted: false,
        };
        if reader.channels == 0 || reader.sample_rate == 0 {
            reader.decode_next()?;
        }
        if reader.channels == 0 || reader.sample_rate == 0 {
            return Err(Error::file_io(
                "read input file",
                path,
                "stream declares no channel layout or sample rate",
            ));
        }
        debug!(
            "Decoding {} ({} channels at {} Hz)",
            path.display(),
            reader.channels,
            reader.sample_rate
        );
        Ok(reader)
    }

    /// WAV layout for output written from this input: integer PCM at the
    /// source bit depth when it has one hound can write, 32-bit float
    /// otherwise.
    pub fn output_spec(&self) -> WavSpec {
        let channels = u16::try_from(self.channels).unwrap_or(u16::MAX);
        let (bits_per_sample, sample_format) = match self.bits_per_sample {
            Some(bits @ (8 | 16 | 24 | 32)) => (bits as u16, SampleFormat::Int),
            _ => (32, SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate: self.sample_rate,
            bits_per_sample,
            sample_format,
        }
    }

    /// Replaces `pending` with the next decoded packet. `false` at the end of
    /// the stream.
    fn decode_next(&mut self) -> Result<bool> {
        while !self.exhausted {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => return Err(Error::file_io("read input file", &self.path, e)),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("Skipping undecodable packet in {}: {reason}", self.path.display());
                    continue;
                }
                Err(e) => return Err(Error::file_io("read input file", &self.path, e)),
            };
            if decoded.frames() == 0 {
                continue;
            }
            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            let channels = spec.channels.count();
            if self.channels == 0 {
                self.channels = channels;
            } else if channels != self.channels {
                return Err(Error::ChannelCountMismatch {
                    stream: "decoded packet",
                    expected: self.channels,
                    actual: channels,
                });
            }
            if self.sample_rate == 0 {
                self.sample_rate = spec.rate;
            }
            self.pending.clear();
            self.pending.extend_from_slice(buffer.samples());
            self.offset = 0;
            return Ok(true);
        }
        Ok(false)
    }
}

impl FrameReader for DecodedFrameReader {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let channels = self.channels.max(1);
        let wanted = buffer.len() / channels * channels;
        let mut filled = 0;
        while filled < wanted {
            if self.offset == self.pending.len() && !self.decode_next()? {
                break;
            }
            let count = (self.pending.len() - self.offset).min(wanted - filled);
            buffer[filled..filled + count]
                .copy_from_slice(&self.pending[self.offset..self.offset + count]);
            self.offset += count;
            filled += count;
        }
        Ok(filled / channels)
    }
}

pub struct WavFrameWriter {
    path: PathBuf,
    spec: WavSpec,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavFrameWriter {
    /// Creates `path` with the sample format and rate of `like` and the
    /// given channel count.
    pub fn create(path: &Path, channels: usize, like: WavSpec) -> Result<Self> {
        let channels = u16::try_from(channels).map_err(|_| {
            Error::file_io(
                "create output file",
                path,
                format!("{channels} channels do not fit a WAV header"),
            )
        })?;
        let spec = WavSpec { channels, ..like };
        let writer =
            WavWriter::create(path, spec).map_err(|e| Error::file_io("create output file", path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            spec,
            writer: Some(writer),
        })
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }
}

impl FrameWriter for WavFrameWriter {
    fn channels(&self) -> usize {
        usize::from(self.spec.channels)
    }

    fn write_frames(&mut self, samples: &[f32]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::file_io(
                "write output file",
                &self.path,
                "file already finalized",
            ));
        };
        let result = match self.spec.sample_format {
            SampleFormat::Float => samples.iter().try_for_each(|s| writer.write_sample(*s)),
            SampleFormat::Int => {
                let scale = int_scale(self.spec.bits_per_sample);
                samples
                    .iter()
                    .try_for_each(|s| writer.write_sample(quantize(*s, scale)))
            }
        };
        result.map_err(|e| Error::file_io("write output file", &self.path, e))
    }

    fn finish(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .finalize()
            .map_err(|e| Error::file_io("close output file", &self.path, e))
    }
}

fn int_scale(bits: u16) -> f32 {
    (1_u64 << (bits.clamp(1, 32) - 1)) as f32
}

fn quantize(sample: f32, scale: f32) -> i32 {
    let scaled = (sample * scale).round();
    scaled.clamp(-scale, scale - 1.0) as i32
}
