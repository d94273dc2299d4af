use cu_scene_tf::cu_tf_payloads::{
    FrameTransform, Quaternion, TfMessage, Time, TransformStamped, Vector3,
};
use cu_scene_tf::{CuDuration, MessageEvent, SceneMessage, SceneTfConfig, SceneTransforms};

fn stamped(parent: &str, child: &str, sec: i32, x: f64) -> TransformStamped {
    let mut tf = TransformStamped::default();
    tf.header.frame_id = parent.to_string();
    tf.header.stamp = Time::new(sec, 0);
    tf.child_frame_id = child.to_string();
    tf.transform.translation = Vector3::new(x, 0.0, 0.0);
    tf
}

fn main() {
    let config = SceneTfConfig::deserialize_ron(r#"(ros: true, follow_frame_id: "base_link")"#)
        .unwrap_or_default();
    let mut scene = SceneTransforms::new(config);

    // a recording preloaded by the player: a static map -> odom and a moving robot
    let all_frames = vec![
        MessageEvent::new(
            "/tf_static",
            CuDuration(0),
            SceneMessage::Transform(
                TfMessage {
                    transforms: vec![stamped("/map", "/odom", 0, 2.0)],
                }
                .into(),
            ),
        ),
        MessageEvent::new(
            "/tf",
            CuDuration(1_000_000_000),
            SceneMessage::Transform(stamped("/odom", "/base_link", 1, 0.0).into()),
        ),
        MessageEvent::new(
            "/tf",
            CuDuration(3_000_000_000),
            SceneMessage::Transform(stamped("/odom", "/base_link", 3, 4.0).into()),
        ),
        MessageEvent::new(
            "/foxglove/tf",
            CuDuration(3_000_000_000),
            SceneMessage::Transform(
                FrameTransform {
                    timestamp: Time::new(3, 0),
                    parent_frame_id: "base_link".into(),
                    child_frame_id: "laser".into(),
                    translation: Vector3::new(0.2, 0.0, 0.3),
                    rotation: Quaternion::identity(),
                }
                .into(),
            ),
        ),
    ];

    for now in [1u64, 2, 3] {
        scene.set_current_time(CuDuration(now * 1_000_000_000));
        scene.handle_all_frames_messages(&all_frames);
        let render = scene.update_frames().map(str::to_string);
        println!(
            "t={now}s render frame {:?}, fixed frame {:?}",
            render,
            scene.fixed_frame_id()
        );
        match scene
            .tree()
            .apply("base_link", "map", CuDuration(now * 1_000_000_000))
        {
            Ok(tf) => println!("  base_link in map: {:?}", tf.translation()),
            Err(e) => println!("  base_link in map: {e}"),
        }
    }

    println!("Frames:");
    for entry in scene.frame_list() {
        println!("  {}", entry.display_name);
    }

    // jump back, the future robot poses are dropped and replayed up to t=1s
    let old_time = scene.current_time();
    scene.set_current_time(CuDuration(1_000_000_000));
    scene.handle_seek(old_time);
    scene.handle_all_frames_messages(&all_frames);
    println!(
        "after seek: {} frames, laser known: {}",
        scene.tree().len(),
        scene.tree().has_frame("laser")
    );
}
