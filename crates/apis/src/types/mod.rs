pub(crate) mod youtube_api;
