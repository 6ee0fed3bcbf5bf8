//! Splitting streams into self-contained PNG sub-streams.

mod common;

use common::{chunk, still_png, ApngBuilder, Frame, BLUE, GREEN, RED, SIGNATURE, WHITE};
use zenapng::chunk::{chunks, first_chunk, ChunkKind};
use zenapng::demux::{demux_next_image, extract_header, DemuxStep};
use zenapng::{BlendMode, DisposeMethod, ImageHeader, PngStillDecoder, StillDecoder};

fn demux_all(data: &[u8]) -> Vec<DemuxStep<PngStillDecoder>> {
    let header = extract_header(data).unwrap();
    let mut steps = Vec::new();
    let mut cursor = Some(header.first_image_chunk());
    while let Some(chunk) = cursor {
        let step = demux_next_image::<PngStillDecoder>(data, &header, chunk).unwrap();
        cursor = step.next;
        steps.push(step);
    }
    steps
}

/// Decode a sub-stream with the `png` crate directly.
fn decode_png(data: &[u8]) -> (u32, u32, Vec<u8>) {
    let decoder = png::Decoder::new(std::io::Cursor::new(data));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());
    (info.width, info.height, buf)
}

#[test]
fn header_contains_preamble_only() {
    let data = ApngBuilder::new(4, 4)
        .frame(Frame::at(0, 0, 4, 4, RED))
        .build();
    let header = extract_header(&data).unwrap();

    assert!(header.is_animated());
    assert!(header.default_image_is_frame());
    assert_eq!(header.animation().unwrap().num_frames, 1);
    assert_eq!(header.first_image_chunk().kind(), ChunkKind::Fctl);

    let kinds: Vec<_> = chunks(header.bytes()).map(|c| c.kind()).collect();
    assert_eq!(kinds, [ChunkKind::Ihdr, ChunkKind::Other(*b"tEXt")]);
    assert_eq!(
        header.image_header(),
        &ImageHeader::parse(first_chunk(&data).unwrap().data(&data)).unwrap()
    );
}

#[test]
fn header_needs_a_boundary_chunk() {
    let data = ApngBuilder::new(4, 4)
        .frame(Frame::at(0, 0, 4, 4, RED))
        .build();
    let boundary = extract_header(&data).unwrap().first_image_chunk();
    assert!(extract_header(&data[..boundary.end() - 1]).is_none());
    assert!(extract_header(&data[..boundary.end()]).is_some());
    assert!(extract_header(&SIGNATURE).is_none());
}

#[test]
fn splits_every_frame_into_a_decodable_png() {
    let data = ApngBuilder::new(4, 4)
        .frame(Frame::at(0, 0, 4, 4, RED))
        .frame(Frame::at(1, 1, 2, 2, GREEN).dispose(1).blend(1))
        .frame(Frame::at(3, 0, 1, 3, BLUE).dispose(2))
        .split_data()
        .build();
    let steps = demux_all(&data);
    assert_eq!(steps.len(), 3);
    assert!(steps[2].next.is_none());

    let expected = [
        (0, 0, 4, 4, RED),
        (1, 1, 2, 2, GREEN),
        (3, 0, 1, 3, BLUE),
    ];
    for (step, (x, y, w, h, px)) in steps.iter().zip(expected) {
        let image = &step.image;
        assert_eq!(image.offset(), (x, y));
        assert_eq!(image.decoder().dimensions(), (w, h));
        assert!(!image.has_pixels());

        let sub = image.decoder().data();
        for c in chunks(sub) {
            assert!(c.crc_matches(sub));
            assert!(!matches!(c.kind(), ChunkKind::Fdat | ChunkKind::Fctl | ChunkKind::Actl));
        }
        let (dw, dh, pixels) = decode_png(sub);
        assert_eq!((dw, dh), (w, h));
        assert_eq!(pixels, px.repeat((w * h) as usize));
    }

    let info = steps[1].image.frame_info().unwrap();
    assert_eq!(info.disposal_method, DisposeMethod::RestoreBackground);
    assert_eq!(info.blend_mode, BlendMode::SourceOver);
    assert_eq!(info.duration_ms, 100);
    let info = steps[2].image.frame_info().unwrap();
    assert_eq!(info.disposal_method, DisposeMethod::RestorePrevious);
    assert_eq!(info.disposal_rect, None);
}

#[test]
fn hidden_default_image_has_no_frame_info() {
    let data = ApngBuilder::new(2, 2)
        .hidden_default(WHITE)
        .frame(Frame::at(0, 0, 2, 2, RED))
        .build();
    let header = extract_header(&data).unwrap();
    assert!(!header.default_image_is_frame());

    let steps = demux_all(&data);
    assert_eq!(steps.len(), 2);
    assert!(steps[0].image.frame_info().is_none());
    assert_eq!(decode_png(steps[0].image.decoder().data()).2, WHITE.repeat(4));
    assert!(steps[1].image.frame_info().is_some());
}

#[test]
fn incomplete_image_is_not_demuxed() {
    let data = ApngBuilder::new(4, 4)
        .frame(Frame::at(0, 0, 4, 4, RED))
        .frame(Frame::at(0, 0, 2, 2, GREEN))
        .build();
    let header = extract_header(&data).unwrap();
    let first = header.first_image_chunk();
    let second_fctl = demux_all(&data)[0].next.unwrap();

    // Image data present but the next frame control is cut short.
    let cut = &data[..second_fctl.end() - 1];
    assert!(demux_next_image::<PngStillDecoder>(cut, &header, first).is_none());
    let cut = &data[..second_fctl.end()];
    assert!(demux_next_image::<PngStillDecoder>(cut, &header, first).is_some());
}

#[test]
fn mixed_image_data_kinds_are_rejected() {
    let mut data = SIGNATURE.to_vec();
    chunk(&mut data, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);
    chunk(&mut data, b"acTL", &[0, 0, 0, 1, 0, 0, 0, 0]);
    let mut fctl = vec![0; 26];
    fctl[4..8].copy_from_slice(&1u32.to_be_bytes());
    fctl[8..12].copy_from_slice(&1u32.to_be_bytes());
    chunk(&mut data, b"fcTL", &fctl);
    chunk(&mut data, b"IDAT", &[1, 2]);
    chunk(&mut data, b"fdAT", &[0, 0, 0, 1, 3, 4]);
    chunk(&mut data, b"IEND", &[]);

    let header = extract_header(&data).unwrap();
    assert!(
        demux_next_image::<PngStillDecoder>(&data, &header, header.first_image_chunk()).is_none()
    );
}

#[test]
fn frame_outside_canvas_is_rejected() {
    let mut data = SIGNATURE.to_vec();
    chunk(&mut data, b"IHDR", &[0, 0, 0, 2, 0, 0, 0, 2, 8, 6, 0, 0, 0]);
    chunk(&mut data, b"acTL", &[0, 0, 0, 1, 0, 0, 0, 0]);
    let mut fctl = vec![0; 26];
    fctl[4..8].copy_from_slice(&2u32.to_be_bytes());
    fctl[8..12].copy_from_slice(&2u32.to_be_bytes());
    fctl[12..16].copy_from_slice(&1u32.to_be_bytes());
    chunk(&mut data, b"fcTL", &fctl);
    chunk(&mut data, b"IDAT", &[1, 2]);
    chunk(&mut data, b"IEND", &[]);

    let header = extract_header(&data).unwrap();
    assert!(
        demux_next_image::<PngStillDecoder>(&data, &header, header.first_image_chunk()).is_none()
    );
}

#[test]
fn still_png_ignores_frame_control() {
    let data = still_png(3, 2, GREEN, None);
    let header = extract_header(&data).unwrap();
    assert!(!header.is_animated());
    let steps = demux_all(&data);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].image.frame_info().is_none());
    assert_eq!(decode_png(steps[0].image.decoder().data()).2, GREEN.repeat(6));
}
