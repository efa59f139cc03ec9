use std::path::Path;

use crate::config::MediaConfig;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Select an input stream for the output
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Attach metadata to every output video stream
    pub fn video_metadata(self, key: &str, value: &str) -> Self {
        self.arg("-metadata:s:v").arg(format!("{}={}", key, value))
    }

    /// Stream machine-readable progress to stdout
    pub fn progress_to_stdout(self) -> Self {
        self.arg("-progress").arg("pipe:1").arg("-nostats")
    }

    /// Render the command for logs
    pub fn display(&self) -> String {
        format!("{} {}", self.binary_path, self.args.join(" "))
    }
}

/// Builder for the fixed commands this crate runs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    config: MediaConfig,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Audio file with the image embedded as its front cover.
    ///
    /// First stream of each input, audio re-encoded, picture stored as a
    /// single attached frame tagged for ID3v2.3 readers.
    pub fn cover_art<P: AsRef<Path>>(&self, media_path: P, cover_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Cover art embedding")
            .overwrite()
            .input(media_path)
            .input(cover_path)
            .map("0:0")
            .map("1:0")
            .audio_codec(&self.config.audio_codec)
            .arg("-c:v:0")
            .arg(&self.config.cover_codec)
            .arg("-id3v2_version")
            .arg("3")
            .video_metadata("title", "Album cover")
            .video_metadata("comment", "Cover (front)")
            .progress_to_stdout()
            .output(output_path)
    }

    /// Video whose picture is the looped image and whose audio is copied
    /// from the media input, cut to the shorter of the two.
    pub fn still_video<P: AsRef<Path>>(&self, media_path: P, cover_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Still image video muxing")
            .overwrite()
            .input(media_path)
            .arg("-loop")
            .arg("1")
            .input(cover_path)
            .map("0:a:0")
            .map("1:v:0")
            .copy_audio()
            .video_codec(&self.config.video_codec)
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-shortest")
            .progress_to_stdout()
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, "Version check").arg("-version")
    }

    /// Build probe version check command
    pub fn probe_version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.config.probe_path, "Probe version check").arg("-version")
    }

    /// Build container duration probe
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.config.probe_path, "Duration probe")
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(path)
    }
}
