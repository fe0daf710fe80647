tonic::include_proto!("vision_service");

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("vision_service");
