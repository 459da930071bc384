use clap::Parser;
use std::path::PathBuf;

/// Upload a video, with an optional thumbnail, to your YouTube channel
#[derive(Parser, Debug)]
#[command(name = "ytup", version, about)]
pub struct Cli {
    /// Video file to upload
    #[arg(required_unless_present = "clear_token")]
    pub video: Option<PathBuf>,

    /// Thumbnail image to attach to the uploaded video
    pub thumbnail: Option<PathBuf>,

    /// Read previous uploads from the local cache instead of the API
    #[arg(short = 'r', long)]
    pub read_cache: bool,

    /// Catch the authorization redirect on a local port instead of pasting the code
    #[arg(long)]
    pub loopback: bool,

    /// Delete the cached token and exit
    #[arg(long)]
    pub clear_token: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_and_thumbnail_positionals() {
        let cli = Cli::try_parse_from(["ytup", "-r", "clip.mp4", "thumb.png"]).unwrap();
        assert_eq!(cli.video, Some(PathBuf::from("clip.mp4")));
        assert_eq!(cli.thumbnail, Some(PathBuf::from("thumb.png")));
        assert!(cli.read_cache);
        assert!(!cli.loopback);
    }

    #[test]
    fn video_is_required_unless_clearing_the_token() {
        assert!(Cli::try_parse_from(["ytup"]).is_err());
        let cli = Cli::try_parse_from(["ytup", "--clear-token"]).unwrap();
        assert!(cli.clear_token);
        assert_eq!(cli.video, None);
    }
}
