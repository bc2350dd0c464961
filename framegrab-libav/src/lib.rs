use core::slice;
use std::{
    ffi::{c_char, c_int, CStr, CString, NulError},
    fmt,
    marker::PhantomData,
    ptr::{null, null_mut},
};

use sys::{
    av_dict_free, av_dict_get, av_dict_set, av_dump_format, av_find_best_stream,
    av_find_input_format, av_frame_alloc, av_frame_free, av_frame_get_buffer, av_get_pix_fmt_name,
    av_packet_alloc, av_packet_free, av_pix_fmt_desc_get, av_read_frame, av_strerror,
    avcodec_alloc_context3, avcodec_find_decoder, avcodec_find_decoder_by_name,
    avcodec_free_context, avcodec_get_name, avcodec_open2, avcodec_parameters_to_context,
    avcodec_receive_frame, avcodec_send_packet, avdevice_register_all, avformat_close_input,
    avformat_find_stream_info, avformat_open_input, sws_freeContext, sws_getContext, sws_scale,
    AVCodecContext, AVDictionary, AVDictionaryEntry, AVFormatContext, AVFrame, AVInputFormat,
    AVMediaType, AVPacket, AVStream, SwsContext, AV_DICT_IGNORE_SUFFIX,
};

pub use sys::AVPixelFormat;

mod sys;

const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> c_int {
    -((a as c_int) | ((b as c_int) << 8) | ((c as c_int) << 16) | ((d as c_int) << 24))
}

/// A negative libav status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvError(c_int);

impl AvError {
    pub const EOF: AvError = AvError(fferrtag(b'E', b'O', b'F', b' '));
    pub const STREAM_NOT_FOUND: AvError = AvError(fferrtag(0xF8, b'S', b'T', b'R'));
    pub const DECODER_NOT_FOUND: AvError = AvError(fferrtag(0xF8, b'D', b'E', b'C'));
    pub const AGAIN: AvError = AvError(-libc::EAGAIN);
    pub const INVALID: AvError = AvError(-libc::EINVAL);
    pub const NO_MEMORY: AvError = AvError(-libc::ENOMEM);

    pub fn from_code(code: c_int) -> Self {
        Self(code)
    }

    /// Splits a raw return value into its non-negative payload or an error.
    pub fn check(status: c_int) -> Result<c_int, AvError> {
        if status < 0 {
            Err(AvError(status))
        } else {
            Ok(status)
        }
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_again(self) -> bool {
        self == Self::AGAIN
    }

    pub fn is_eof(self) -> bool {
        self == Self::EOF
    }

    pub fn message(self) -> String {
        let mut buf = [0 as c_char; 64];
        unsafe {
            av_strerror(self.0, buf.as_mut_ptr(), buf.len());
            CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
        }
    }
}

impl fmt::Debug for AvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AvError({}: {})", self.0, self.message())
    }
}

impl fmt::Display for AvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message(), self.0)
    }
}

impl std::error::Error for AvError {}

impl From<NulError> for AvError {
    fn from(_: NulError) -> Self {
        Self::INVALID
    }
}

pub struct Dictionary(*mut AVDictionary);

unsafe impl Send for Dictionary {}

impl Dictionary {
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, NulError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut result = Dictionary::default();
        for (key, value) in pairs {
            result.set(key.as_ref(), value.as_ref())?;
        }
        Ok(result)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), NulError> {
        let key = CString::new(key)?;
        let value = CString::new(value)?;
        unsafe {
            av_dict_set(&mut self.0, key.as_ptr(), value.as_ptr(), 0);
        }
        Ok(())
    }

    /// Keys still present. After `FormatContext::open` these are the options
    /// the demuxer did not consume.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut entry: *mut AVDictionaryEntry = null_mut();
        loop {
            entry = unsafe { av_dict_get(self.0, c"".as_ptr(), entry, AV_DICT_IGNORE_SUFFIX as _) };
            if entry.is_null() {
                break;
            }
            keys.push(
                unsafe { CStr::from_ptr((*entry).key) }
                    .to_string_lossy()
                    .into_owned(),
            );
        }
        keys
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Dictionary(null_mut())
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        unsafe { av_dict_free(&mut self.0) }
    }
}

pub struct Packet(*mut AVPacket);

impl Packet {
    pub fn new() -> Option<Self> {
        Some(unsafe { av_packet_alloc() })
            .filter(|ptr| !ptr.is_null())
            .map(Packet)
    }

    pub fn stream_index(&self) -> usize {
        unsafe { (*self.0).stream_index as usize }
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        unsafe { av_packet_free(&mut self.0) }
    }
}

static FORMAT_INIT: std::sync::Once = std::sync::Once::new();

pub struct Format(*mut AVInputFormat);

unsafe impl Send for Format {}

impl Format {
    pub fn from_name(name: &str) -> Option<Self> {
        FORMAT_INIT.call_once(|| unsafe {
            avdevice_register_all();
        });
        let name = CString::new(name).ok()?;
        Some(unsafe { av_find_input_format(name.as_ptr()) })
            .filter(|ptr| !ptr.is_null())
            .map(|ptr| Self(ptr as _))
    }
}

pub struct FormatContext(*mut AVFormatContext);

impl FormatContext {
    pub fn open(
        path: &str,
        format: Option<Format>,
        options: Option<&mut Dictionary>,
    ) -> Result<FormatContext, AvError> {
        let mut context = null_mut();
        let path = CString::new(path)?;
        let format = format.map_or(null_mut(), |fmt| fmt.0);
        let mut fallback_options = null_mut();
        let options = options.map_or(&mut fallback_options, |dict| &mut dict.0);
        let status = unsafe { avformat_open_input(&mut context, path.as_ptr(), format, options) };
        AvError::check(status)?;
        Ok(FormatContext(context))
    }

    pub fn find_stream_info(&mut self) -> Result<(), AvError> {
        AvError::check(unsafe { avformat_find_stream_info(self.0, null_mut()) })?;
        Ok(())
    }

    pub fn streams(&self) -> impl Iterator<Item = Stream<'_>> + '_ {
        let as_slice = unsafe {
            let context = &*self.0;
            if context.streams.is_null() {
                &[]
            } else {
                slice::from_raw_parts(context.streams, context.nb_streams as usize)
            }
        };
        as_slice.iter().map(|&av_stream| Stream::new(av_stream))
    }

    /// Picks the stream libav ranks best for video.
    pub fn best_video_stream(&self) -> Result<Stream<'_>, AvError> {
        let index = AvError::check(unsafe {
            av_find_best_stream(
                self.0,
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                null_mut(),
                0,
            )
        })?;
        self.streams()
            .nth(index as usize)
            .ok_or(AvError::STREAM_NOT_FOUND)
    }

    /// Reads the next packet; `Ok(None)` at end of input.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, AvError> {
        let packet = Packet::new().ok_or(AvError::NO_MEMORY)?;
        match AvError::check(unsafe { av_read_frame(self.0, packet.0) }) {
            Ok(_) => Ok(Some(packet)),
            Err(e) if e.is_eof() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn dump(&self, url: &str) {
        let url = CString::new(url).unwrap_or_default();
        unsafe { av_dump_format(self.0, 0, url.as_ptr(), 0) }
    }
}

impl Drop for FormatContext {
    fn drop(&mut self) {
        unsafe {
            avformat_close_input(&mut self.0);
        }
    }
}

pub struct Plane<'f> {
    pub data: &'f [u8],
    pub stride: usize,
}

pub struct Frame(*mut AVFrame);

unsafe impl Send for Frame {}

impl Frame {
    pub fn new() -> Option<Self> {
        Some(unsafe { av_frame_alloc() })
            .filter(|ptr| !ptr.is_null())
            .map(Self)
    }

    pub fn alloc(width: usize, height: usize, format: AVPixelFormat) -> Option<Self> {
        let frame = Self::new()?;
        unsafe {
            (*frame.0).width = width as _;
            (*frame.0).height = height as _;
            (*frame.0).format = format.0;
        }
        if unsafe { av_frame_get_buffer(frame.0, 0) } != 0 {
            return None;
        };
        Some(frame)
    }

    pub fn format(&self) -> AVPixelFormat {
        AVPixelFormat(unsafe { (*self.0).format })
    }

    pub fn height(&self) -> usize {
        unsafe { (*self.0).height as _ }
    }

    pub fn width(&self) -> usize {
        unsafe { (*self.0).width as _ }
    }

    /// Borrows one plane with its stride, or `None` if the format has no
    /// such plane.
    pub fn plane(&self, index: usize) -> Option<Plane<'_>> {
        let (data, linesize) = unsafe { (&(*self.0).data, &(*self.0).linesize) };
        let ptr = *data.get(index)?;
        let stride = usize::try_from(*linesize.get(index)?).ok()?;
        if ptr.is_null() || stride == 0 {
            return None;
        }
        let rows = self.plane_rows(index);
        Some(Plane {
            data: unsafe { slice::from_raw_parts(ptr, stride * rows) },
            stride,
        })
    }

    fn plane_rows(&self, index: usize) -> usize {
        let height = self.height();
        let desc = unsafe { av_pix_fmt_desc_get(self.format()) };
        if desc.is_null() || index == 0 || index == 3 {
            return height;
        }
        let shift = unsafe { (*desc).log2_chroma_h } as usize;
        (height + (1 << shift) - 1) >> shift
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe { av_frame_free(&mut self.0) }
    }
}

pub fn pixel_format_name(format: AVPixelFormat) -> String {
    let name = unsafe { av_get_pix_fmt_name(format) };
    if name.is_null() {
        return String::from("none");
    }
    unsafe { CStr::from_ptr(name) }
        .to_string_lossy()
        .into_owned()
}

pub struct Stream<'c> {
    stream: *mut AVStream,
    _context: PhantomData<&'c FormatContext>,
}

impl<'c> Stream<'c> {
    fn new(stream: *mut AVStream) -> Self {
        Self {
            stream,
            _context: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        unsafe { (*self.stream).index as usize }
    }

    pub fn width(&self) -> usize {
        unsafe { (*(*self.stream).codecpar).width as usize }
    }

    pub fn height(&self) -> usize {
        unsafe { (*(*self.stream).codecpar).height as usize }
    }

    pub fn pixel_format(&self) -> AVPixelFormat {
        AVPixelFormat(unsafe { (*(*self.stream).codecpar).format })
    }

    pub fn codec_name(&self) -> String {
        let name = unsafe { avcodec_get_name((*(*self.stream).codecpar).codec_id) };
        unsafe { CStr::from_ptr(name) }
            .to_string_lossy()
            .into_owned()
    }

    /// Opens a decoder bound to this stream's codec parameters. `name` forces
    /// a specific decoder instead of the default one for the codec id.
    pub fn create_decoder(&self, name: Option<&str>) -> Result<Decoder, AvError> {
        let borrowed_codec = unsafe { (*self.stream).codecpar };
        let codec = if let Some(name) = name {
            let name = CString::new(name)?;
            unsafe { avcodec_find_decoder_by_name(name.as_ptr()) }
        } else {
            unsafe { avcodec_find_decoder((*borrowed_codec).codec_id) }
        };
        if codec.is_null() {
            return Err(AvError::DECODER_NOT_FOUND);
        }
        let context = unsafe { avcodec_alloc_context3(codec) };
        if context.is_null() {
            return Err(AvError::NO_MEMORY);
        }
        let decoder = Decoder { context };
        AvError::check(unsafe { avcodec_parameters_to_context(decoder.context, borrowed_codec) })?;
        AvError::check(unsafe { avcodec_open2(decoder.context, codec, null_mut()) })?;
        Ok(decoder)
    }
}

pub struct Decoder {
    context: *mut AVCodecContext,
}

impl Decoder {
    /// Queues a packet, or the flush request when `packet` is `None`.
    pub fn send(&mut self, packet: Option<&Packet>) -> Result<(), AvError> {
        let packet = packet.map_or(null(), |packet| packet.0 as *const AVPacket);
        AvError::check(unsafe { avcodec_send_packet(self.context, packet) })?;
        Ok(())
    }

    pub fn receive(&mut self, frame: &mut Frame) -> Result<(), AvError> {
        AvError::check(unsafe { avcodec_receive_frame(self.context, frame.0) })?;
        Ok(())
    }

    pub fn codec_name(&self) -> String {
        let name = unsafe { avcodec_get_name((*self.context).codec_id) };
        unsafe { CStr::from_ptr(name) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        unsafe {
            avcodec_free_context(&mut self.context);
        }
    }
}

/// libswscale resampling mode. Only bilinear is used for same-size conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleFlags(c_int);

impl ScaleFlags {
    pub const BILINEAR: ScaleFlags = ScaleFlags(0x2);
}

pub struct ScalingContext(*mut SwsContext);

impl ScalingContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src_width: usize,
        src_height: usize,
        src_format: AVPixelFormat,
        dst_width: usize,
        dst_height: usize,
        dst_format: AVPixelFormat,
        flags: ScaleFlags,
    ) -> Option<Self> {
        let context = unsafe {
            sws_getContext(
                src_width as _,
                src_height as _,
                src_format,
                dst_width as _,
                dst_height as _,
                dst_format,
                flags.0 as _,
                null_mut(),
                null_mut(),
                null(),
            )
        };
        Some(context)
            .filter(|ptr| !ptr.is_null())
            .map(ScalingContext)
    }

    pub fn scale(&mut self, src: &Frame, dest: &mut Frame) -> Result<(), AvError> {
        let status = unsafe {
            let src_slice = (*src.0).data.as_ptr().cast::<*const u8>();
            let src_stride = (*src.0).linesize.as_ptr();
            let dst_slice = (*dest.0).data.as_ptr();
            let dst_stride = (*dest.0).linesize.as_ptr();
            sws_scale(
                self.0,
                src_slice,
                src_stride,
                0,
                src.height() as _,
                dst_slice,
                dst_stride,
            )
        };
        AvError::check(status)?;
        Ok(())
    }
}

impl Drop for ScalingContext {
    fn drop(&mut self) {
        unsafe {
            sws_freeContext(self.0);
        }
    }
}
