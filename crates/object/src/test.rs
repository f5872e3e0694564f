macro_rules! assert_read_write {
    (
        $type:ty : Read<$read_ty:ty> + Write<$write_ty:ty> {
            bytes_value(auto_endian) = $value:expr,
            rust_value = $rust_value:expr $(,)?
        }
    ) => {{
        // Big endian.
        {
            let bytes = ($value).to_be_bytes();
            let rust_value = $rust_value;

            assert_eq!(
                <$type as crate::Read<$read_ty>>::read::<crate::BigEndian, ()>(&bytes),
                Ok((&[] as &[u8], rust_value))
            );

            let mut written = Vec::new();
            <$type as crate::Write<$write_ty>>::write::<crate::BigEndian, _>(&rust_value, &mut written)
                .unwrap();

            assert_eq!(written, bytes);
        }

        // Little endian.
        {
            let bytes = ($value).to_le_bytes();
            let rust_value = $rust_value;

            assert_eq!(
                <$type as crate::Read<$read_ty>>::read::<crate::LittleEndian, ()>(&bytes),
                Ok((&[] as &[u8], rust_value))
            );

            let mut written = Vec::new();
            <$type as crate::Write<$write_ty>>::write::<crate::LittleEndian, _>(&rust_value, &mut written)
                .unwrap();

            assert_eq!(written, bytes);
        }
    }};

    (
        $type:ty : Read<$read_ty:ty> + Write<$write_ty:ty> {
            bytes_value(big_endian) = $value:expr,
            rust_value = $rust_value:expr $(,)?
        }
    ) => {{
        let bytes = $value;
        let rust_value = $rust_value;

        assert_eq!(
            <$type as crate::Read<$read_ty>>::read::<crate::BigEndian, ()>(bytes),
            Ok((&[] as &[u8], rust_value))
        );

        let mut written = Vec::new();
        <$type as crate::Write<$write_ty>>::write::<crate::BigEndian, _>(&rust_value, &mut written)
            .unwrap();

        assert_eq!(written, bytes);
    }};
}
