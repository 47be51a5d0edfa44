/// 视频输入系统 (Video Input System)
///
/// 独立解码线程中运行, 负责视频文件解码
/// - Probe:   ffprobe 读取视频信息
/// - Decoder: ffmpeg 管道解码为灰度帧
/// - Movie:   视频文件输入源 (分析区间, 分辨率)
/// - Sequence: 内存帧序列
pub mod decoder;
pub mod movie;
pub mod probe;
pub mod sequence;

pub use decoder::{FfmpegDecoder, GrayFrame};
pub use movie::{FrameStream, ImageSource, MovieFile};
pub use probe::{parse_frame_rate, probe_video, VideoInfo};
pub use sequence::FrameSequence;
