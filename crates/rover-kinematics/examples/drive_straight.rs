use rover_kinematics::*;

fn main() {
    let wheel_radius = 0.098;
    let wheel_separation = 0.37559;
    let kinematics_result = DifferentialDrive::new(wheel_radius, wheel_separation);

    let mut current_pose = Pose2D::new(0.0, 0.0, 0.0);
    let command = ChassisSpeeds::new(1.0, 0.2); // 1.0 m/s forward, 0.2 rad/s turning
    let dt = 0.02; // Physics step in seconds
    let num_steps = 50;

    match kinematics_result {
        Ok(kinematics) => {
            let rates = kinematics.inverse_kinematics(command).quantized(3);
            println!("Initializing simulation...");
            println!("  {}", kinematics);
            println!("  Command:      {}", command);
            println!("  Wheel rates:  {}", rates);
            println!("  Time Step:    {} s", dt);
            println!("  Num Steps:    {}", num_steps);
            println!("\nSimulating...");

            for i in 0..num_steps {
                match kinematics.integrate_wheel_rates(current_pose, rates, dt) {
                    Ok(new_pose) => {
                        current_pose = new_pose;
                        if (i + 1) % 10 == 0 {
                            println!("Step {:>2}: Pose: {}", i + 1, current_pose);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error during simulation step {}: {}", i + 1, e);
                        break;
                    }
                }
            }

            println!("\nSimulation complete.");
            println!("Final Pose: {}", current_pose.wrapped());
        }
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {}", e);
        }
    }
}
