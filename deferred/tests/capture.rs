use backpatch_deferred::{
    capture::{Target, RAW_KEY},
    decode, encode, CaptureCfg, Decoder, Encoder, Error, Region,
};
use bytes::Bytes;

const INPUT: &[u8] = &[0xff, 0x01, 0x02, 0x03];

fn read_array(decoder: &mut Decoder) -> Result<Vec<u8>, Error> {
    (0..3)
        .map(|i| decoder.index(i, |d| d.read::<u8>()))
        .collect()
}

#[test]
fn test_parse() {
    // Default and custom key
    for cfg in [CaptureCfg::default(), CaptureCfg::new("newname")] {
        let mut decoder = Decoder::new(Bytes::from_static(INPUT));
        assert_eq!(decoder.read_field::<u8>("num").unwrap(), 0xff);
        let array = decoder
            .field("array", |d| d.capture(&cfg, read_array))
            .unwrap();
        assert_eq!(array, vec![1, 2, 3]);

        let captures = decoder.finish().unwrap();
        let region = captures.get("array", &cfg.key).unwrap();
        assert_eq!(region.data().as_ref(), &[1, 2, 3]);
        assert_eq!((region.start(), region.end()), (1, 4));
        assert_eq!(captures.len(), 1);
    }
}

#[test]
fn test_build() {
    let mut encoder = Encoder::new();
    encoder
        .capture(&CaptureCfg::default(), |e| {
            for (i, value) in [1u8, 2, 3].iter().enumerate() {
                e.index(i, |e| {
                    e.write(value);
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();
    let region = encoder.captures().raw("").unwrap().clone();
    assert_eq!(&encoder.finish().unwrap()[..], &[1, 2, 3]);
    assert_eq!(region.data().as_ref(), &[1, 2, 3]);
}

#[test]
fn test_flattened_and_parent() {
    let input = Bytes::from_static(&[0xff, 0x00, 0x02, 0x0a, 0x0b, 0x0c]);
    let mut decoder = Decoder::new(input);
    decoder.read_field::<u8>("val").unwrap();

    // Fields of a flattened structure belong to the enclosing scope, and so does its capture
    let num = decoder
        .capture(&CaptureCfg::new("raw_data"), |d| d.read_field::<u16>("num"))
        .unwrap();
    assert_eq!(num, 0x0002);

    // Captured region of `array`, attached to the enclosing value
    let cfg = CaptureCfg::new("array_raw").with_target(Target::Parent);
    decoder
        .field("array", |d| d.capture(&cfg, read_array))
        .unwrap();

    let captures = decoder.finish().unwrap();
    assert_eq!(
        captures.get("", "raw_data").unwrap().data().as_ref(),
        &[0x00, 0x02]
    );
    assert_eq!(
        captures.get("", "array_raw").unwrap().data().as_ref(),
        &[0x0a, 0x0b, 0x0c]
    );
    assert!(captures.get("array", "array_raw").is_none());
    let keys: Vec<_> = captures.iter().map(|(path, key, _)| (path, key)).collect();
    assert_eq!(keys, vec![("", "array_raw"), ("", "raw_data")]);
}

#[test]
fn test_duplicate() {
    let result = decode(Bytes::from_static(b"0"), |d| {
        d.field("value", |d| {
            d.capture(&CaptureCfg::new("value"), |d| d.read_field::<u8>("value"))
        })
    });
    assert!(matches!(
        result,
        Err(Error::DuplicateCaptureKey { path, key }) if path == "value" && key == "value"
    ));

    let result = encode(|e| {
        e.write_field("raw", &0u8);
        e.field("value", |e| {
            let cfg = CaptureCfg::new("raw").with_target(Target::Parent);
            e.capture(&cfg, |e| {
                e.write(&1u8);
                Ok(())
            })
        })
    });
    assert!(matches!(
        result,
        Err(Error::DuplicateCaptureKey { path, key }) if path.is_empty() && key == "raw"
    ));
}

#[test]
fn test_capture_in_frame() {
    let mut encoder = Encoder::new();
    encoder.write(&0xaau8);
    encoder
        .prefixed::<u32, _>(|e| {
            e.write(&0xbbu8);
            e.field("inner", |e| {
                e.capture(&CaptureCfg::default(), |e| {
                    e.put_slice(&[1, 2]);
                    Ok(())
                })
            })
        })
        .unwrap();

    // Offsets refer to the final output, not the frame
    let region = encoder.captures().get("inner", RAW_KEY).unwrap().clone();
    assert_eq!(region.start(), 1 + 4 + 1);
    let encoded = encoder.finish().unwrap();
    assert_eq!(&encoded[region.start()..region.end()], region.data().as_ref());

    // Decoding captures the same region
    let decoded: Region = decode(encoded, |d| {
        d.read::<u8>()?;
        d.prefixed::<u32, _>(|d| {
            d.read::<u8>()?;
            d.field("inner", |d| d.capture(&CaptureCfg::default(), |d| d.take(2)))?;
            Ok(d.captures().raw("inner").cloned())
        })
        .map(Option::unwrap)
    })
    .unwrap();
    assert_eq!(decoded, region);
}
