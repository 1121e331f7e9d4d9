/// One decoded unit of a streamed generation response.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    NoImage,
    Image { data: Vec<u8>, mime_type: String },
}

impl ChunkEvent {
    pub fn image(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        ChunkEvent::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}
